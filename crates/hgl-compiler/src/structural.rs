//! Structural transforms
//!
//! Bottom-up synthesis from mid-level syntax nodes (entity states,
//! condition clauses, actions, times) to rule fragments.

use hgl_automation::{Amount, DataValue, ServiceData};
use hgl_config::CompilerConfig;
use hgl_core::domains;

use crate::ast::{
    ActionExpr, ConditionBody, ConditionClause, ElseClause, EntityState, Lexeme, TimeExpr,
};
use crate::error::CompileResult;
use crate::fragment::{
    ActionFragment, ActionSpec, ConditionFragment, ConditionSpec, ElseFragment, Inversion,
    ServiceCall, StateExpr, TimeSpec, TriggerFragment, TriggerSpec,
};
use crate::leaf::{self, GlobalState};

/// Action name expanded into the camera-to-media-player sequence
pub const MEDIA_COMPOSITE: &str = "play_doorbird_media";

/// How long the camera stream stays on the players
const MEDIA_COMPOSITE_DELAY: &str = "00:00:30";

/// Trigger fragment for the entity state of a state-change rule
pub fn state_trigger(state: &EntityState) -> CompileResult<TriggerFragment> {
    match state {
        EntityState::Simple {
            entity,
            value,
            attributes,
        } => {
            let token = leaf::brace_token(entity)?;
            let to = leaf::state_value(value);
            let checks: Vec<_> = attributes
                .iter()
                .map(|check| (check.attribute.clone(), leaf::state_value(&check.value)))
                .collect();

            let mut fragment = TriggerFragment::new(
                TriggerSpec::State {
                    entity: token.pattern.clone(),
                    to: to.clone(),
                    hold: None,
                },
                format!("{} is {}", token.pattern, to),
            );
            if !checks.is_empty() {
                fragment.conditions.push(ConditionSpec::Attributes {
                    entity: token.pattern,
                    checks,
                });
            }
            fragment.expansion = token.expansion;
            Ok(fragment)
        }
        EntityState::Multiple { connective, .. } | EntityState::Condis { connective, .. } => {
            let entities = state
                .entities()
                .into_iter()
                .map(|name| leaf::entity(name).map(|_| name.text.clone()))
                .collect::<CompileResult<Vec<_>>>()?;

            let mut fragment = TriggerFragment::new(
                TriggerSpec::Expression {
                    expr: state_expr(state)?,
                    hold: None,
                },
                summary(state),
            );
            fragment.inversion = Some(Inversion {
                connective: connective.inverse(),
                entities,
            });
            Ok(fragment)
        }
    }
}

/// Boolean expression for an entity state; brace lists expand in place
pub fn state_expr(state: &EntityState) -> CompileResult<StateExpr> {
    Ok(match state {
        EntityState::Simple {
            entity,
            value,
            attributes,
        } => StateExpr::Is {
            entity: leaf::brace_token(entity)?.inline,
            value: leaf::state_value(value),
            attributes: attributes
                .iter()
                .map(|check| (check.attribute.clone(), leaf::state_value(&check.value)))
                .collect(),
        },
        EntityState::Multiple { connective, states } => StateExpr::Group {
            connective: *connective,
            items: states
                .iter()
                .map(state_expr)
                .collect::<CompileResult<Vec<_>>>()?,
        },
        EntityState::Condis {
            connective,
            entities,
            value,
        } => {
            let value = leaf::state_value(value);
            StateExpr::Group {
                connective: *connective,
                items: entities
                    .iter()
                    .map(|entity| StateExpr::is(entity.text.clone(), value.clone()))
                    .collect(),
            }
        }
    })
}

/// Text of an entity state for rule names
fn summary(state: &EntityState) -> String {
    match state {
        EntityState::Simple { entity, value, .. } => {
            format!("{} is {}", entity.text, value.text())
        }
        EntityState::Multiple { connective, states } => states
            .iter()
            .map(summary)
            .collect::<Vec<_>>()
            .join(&format!(" {} ", connective.as_str())),
        EntityState::Condis {
            entities, value, ..
        } => {
            let names: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
            format!("{} is {}", names.join(","), value.text())
        }
    }
}

/// `while|when <state or global state>`
pub fn condition(clause: &ConditionClause) -> CompileResult<ConditionFragment> {
    let spec = match &clause.body {
        ConditionBody::State(state) => ConditionSpec::State(state_expr(state)?),
        ConditionBody::Global(word) => ConditionSpec::Global(GlobalState::from_word(word)),
    };
    Ok(ConditionFragment {
        spec,
        scope: clause.scope,
    })
}

/// A service call, or the media composite sequence
pub fn action(expr: &ActionExpr, config: &CompilerConfig) -> CompileResult<ActionFragment> {
    if expr.service.text == MEDIA_COMPOSITE {
        return media_composite(expr, config);
    }

    let service = leaf::brace_token(&expr.service)?;
    let mut entities = Vec::new();
    let mut data = ServiceData::new();
    for param in &expr.params {
        match &param.value {
            None => entities.push(leaf::brace_token(&param.name)?.inline),
            Some(value) => {
                let value = DataValue::from(leaf::state_value(value));
                data = data.merge(ServiceData::from_path(&param.name.text, value));
            }
        }
    }

    let mut call = ServiceCall::new(service.pattern);
    if !entities.is_empty() {
        call.entities = Some(entities.join(","));
    }
    call.data = data;

    Ok(ActionFragment {
        steps: vec![ActionSpec::Call(call)],
        expansion: service.expansion,
    })
}

/// Show the camera stream on the listed players, wait, then turn them off
///
/// The camera name is the rule's `*` placeholder.
fn media_composite(expr: &ActionExpr, config: &CompilerConfig) -> CompileResult<ActionFragment> {
    let players = expr
        .params
        .iter()
        .filter(|param| param.value.is_none())
        .map(|param| leaf::brace_token(&param.name).map(|token| token.inline))
        .collect::<CompileResult<Vec<_>>>()?
        .join(",");
    let players = domains::qualify_list(&players, domains::MEDIA_PLAYER);

    let mut play = ServiceCall::new("media_player.play_media");
    play.data_template.insert("entity_id", players.as_str());
    play.data_template.insert(
        "media_content_id",
        DataValue::Text(format!(
            "{}/api/camera_proxy_stream/camera.*_live?token={{{{states.camera.*_live.attributes.access_token}}}}",
            config.base_url
        )),
    );
    play.data_template.insert("media_content_type", "image/jpg");

    Ok(ActionFragment {
        steps: vec![
            ActionSpec::Call(play),
            ActionSpec::Delay(MEDIA_COMPOSITE_DELAY.to_string()),
            ActionSpec::Call(ServiceCall::new("media_player.turn_off").with_entities(players)),
        ],
        expansion: None,
    })
}

/// `else <value> [for <duration>] do <action>`
pub fn else_branch(clause: &ElseClause, config: &CompilerConfig) -> CompileResult<ElseFragment> {
    Ok(ElseFragment {
        value: leaf::state_value(&clause.value),
        hold: clause.hold.as_ref().map(leaf::duration).transpose()?,
        action: action(&clause.action, config)?,
    })
}

/// Clock or solar time
pub fn time(expr: &TimeExpr) -> CompileResult<TimeSpec> {
    match expr {
        TimeExpr::Literal(literal) => Ok(TimeSpec::At(leaf::time_literal(literal)?)),
        TimeExpr::Logical { word, offset } => {
            let offset = match offset {
                Some((sign, duration)) => {
                    let minutes = leaf::duration(duration)?.to_minutes();
                    Some((*sign, Amount::from(minutes)))
                }
                None => None,
            };
            Ok(TimeSpec::Solar {
                event: leaf::fold_solar(word).to_string(),
                offset,
            })
        }
    }
}

/// MQTT message trigger on `topic`, checking the payload
pub fn message_trigger(word: &Lexeme, topic: &str) -> CompileResult<TriggerFragment> {
    let token = leaf::brace_token(word)?;
    let mut fragment = TriggerFragment::new(
        TriggerSpec::Mqtt {
            topic: topic.to_string(),
        },
        token.pattern.clone(),
    );
    fragment.conditions.push(ConditionSpec::Payload {
        message: token.pattern,
    });
    fragment.expansion = token.expansion;
    Ok(fragment)
}

/// Event trigger
pub fn event_trigger(word: &Lexeme) -> CompileResult<TriggerFragment> {
    let token = leaf::brace_token(word)?;
    let mut fragment = TriggerFragment::new(
        TriggerSpec::Event {
            event_type: token.pattern.clone(),
        },
        token.pattern,
    );
    fragment.expansion = token.expansion;
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeCheck, Connective, DurationExpr, Param, Scope, Sign, ValueExpr};
    use hgl_automation::StateValue;
    use hgl_core::Span;

    fn lex(text: &str) -> Lexeme {
        Lexeme::new(text, Span::new((1, 1), (1, 1 + text.len())))
    }

    fn raw(text: &str) -> ValueExpr {
        ValueExpr::Raw(text.to_string())
    }

    fn simple(entity: &str, value: &str) -> EntityState {
        EntityState::Simple {
            entity: lex(entity),
            value: raw(value),
            attributes: vec![],
        }
    }

    #[test]
    fn test_simple_state_with_braces() {
        let fragment = state_trigger(&simple("sensor.{a,b}", "motion")).unwrap();
        assert_eq!(
            fragment.spec,
            TriggerSpec::State {
                entity: "sensor.*".into(),
                to: StateValue::from("motion"),
                hold: None
            }
        );
        assert_eq!(fragment.expansion.unwrap().len(), 2);
        assert_eq!(fragment.summary, "sensor.* is motion");
        assert!(fragment.inversion.is_none());
    }

    #[test]
    fn test_simple_state_with_attributes() {
        let state = EntityState::Simple {
            entity: lex("light.den"),
            value: raw("on"),
            attributes: vec![AttributeCheck {
                attribute: "brightness".into(),
                value: raw("255"),
            }],
        };
        let fragment = state_trigger(&state).unwrap();
        assert_eq!(
            fragment.conditions,
            vec![ConditionSpec::Attributes {
                entity: "light.den".into(),
                checks: vec![("brightness".into(), StateValue::Number(255))],
            }]
        );
    }

    #[test]
    fn test_condis_records_inverse() {
        let state = EntityState::Condis {
            connective: Connective::Or,
            entities: vec![lex("door1"), lex("door2")],
            value: raw("open"),
        };
        let fragment = state_trigger(&state).unwrap();
        let inversion = fragment.inversion.unwrap();
        assert_eq!(inversion.connective, Connective::And);
        assert_eq!(inversion.entities, vec!["door1", "door2"]);
        assert_eq!(fragment.summary, "door1,door2 is open");
        match fragment.spec {
            TriggerSpec::Expression { expr, .. } => assert_eq!(
                expr.template("sensor"),
                "{{is_state(\"sensor.door1\", \"open\") or is_state(\"sensor.door2\", \"open\")}}"
            ),
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_multiple_state_summary() {
        let state = EntityState::Multiple {
            connective: Connective::And,
            states: vec![simple("a", "1"), simple("b", "2")],
        };
        let fragment = state_trigger(&state).unwrap();
        assert_eq!(fragment.summary, "a is 1 and b is 2");
        assert_eq!(fragment.inversion.unwrap().connective, Connective::Or);
    }

    #[test]
    fn test_condition_clause() {
        let clause = ConditionClause {
            scope: Scope::While,
            body: ConditionBody::Global("sunny".into()),
        };
        let fragment = condition(&clause).unwrap();
        assert_eq!(fragment.scope, Scope::While);
        assert_eq!(fragment.spec, ConditionSpec::Global(GlobalState::Sunny));
    }

    #[test]
    fn test_action_params() {
        let expr = ActionExpr {
            service: lex("light.turn_on"),
            params: vec![
                Param {
                    name: lex("{bulb1,bulb2}"),
                    value: None,
                },
                Param {
                    name: lex("color.r"),
                    value: Some(raw("10")),
                },
                Param {
                    name: lex("color.g"),
                    value: Some(raw("20")),
                },
            ],
        };
        let fragment = action(&expr, &CompilerConfig::default()).unwrap();
        let call = fragment.steps[0].as_call().unwrap();
        assert_eq!(call.entities.as_deref(), Some("bulb1,bulb2"));
        match call.data.get("color") {
            Some(DataValue::Map(color)) => {
                assert_eq!(color.get("r"), Some(&DataValue::Number(10)));
                assert_eq!(color.get("g"), Some(&DataValue::Number(20)));
            }
            other => panic!("unexpected data {:?}", other),
        }
        assert!(fragment.expansion.is_none());
    }

    #[test]
    fn test_service_template() {
        let expr = ActionExpr {
            service: lex("light.turn_{on,off}"),
            params: vec![],
        };
        let fragment = action(&expr, &CompilerConfig::default()).unwrap();
        assert_eq!(fragment.steps[0].as_call().unwrap().service, "light.turn_*");
        assert_eq!(fragment.expansion.unwrap().elements(), &["on", "off"]);
    }

    #[test]
    fn test_media_composite() {
        let expr = ActionExpr {
            service: lex(MEDIA_COMPOSITE),
            params: vec![Param {
                name: lex("kitchen"),
                value: None,
            }],
        };
        let config = CompilerConfig::default()
            .with_base_url("https://hass.local")
            .unwrap();
        let fragment = action(&expr, &config).unwrap();
        assert_eq!(fragment.steps.len(), 3);

        let play = fragment.steps[0].as_call().unwrap();
        assert_eq!(play.service, "media_player.play_media");
        assert_eq!(
            play.data_template.get("entity_id"),
            Some(&DataValue::from("media_player.kitchen"))
        );
        assert_eq!(
            play.data_template.get("media_content_id"),
            Some(&DataValue::from(
                "https://hass.local/api/camera_proxy_stream/camera.*_live?token={{states.camera.*_live.attributes.access_token}}"
            ))
        );
        assert_eq!(
            fragment.steps[1],
            ActionSpec::Delay("00:00:30".to_string())
        );
        assert_eq!(
            fragment.steps[2].as_call().unwrap().entities.as_deref(),
            Some("media_player.kitchen")
        );
    }

    #[test]
    fn test_solar_time_with_offset() {
        let expr = TimeExpr::Logical {
            word: "sunset".into(),
            offset: Some((
                Sign::Minus,
                DurationExpr::Units {
                    amount: lex("1"),
                    unit: "hour".into(),
                },
            )),
        };
        assert_eq!(
            time(&expr).unwrap(),
            TimeSpec::Solar {
                event: "setting".into(),
                offset: Some((Sign::Minus, Amount::Whole(60))),
            }
        );
    }

    #[test]
    fn test_message_trigger() {
        let fragment = message_trigger(&lex("{vol_up,vol_down}"), "vantage/misc").unwrap();
        assert_eq!(
            fragment.spec,
            TriggerSpec::Mqtt {
                topic: "vantage/misc".into()
            }
        );
        assert_eq!(
            fragment.conditions,
            vec![ConditionSpec::Payload {
                message: "*".into()
            }]
        );
        assert_eq!(fragment.expansion.unwrap().len(), 2);
    }
}
