//! End-to-end compilation tests
//!
//! Each test compiles an `.hgl` fixture (or a short inline source) and
//! checks the emitted records or their YAML form.

mod common;

use std::collections::HashSet;

use common::{compile_fixture, emit_fixture, load_fixture, record};
use hgl_automation::{
    Amount, AutomationRecord, Condition, DataValue, HoldDuration, StateValue, Trigger,
};
use hgl_compiler::{CompileError, Compiler};
use hgl_config::CompilerConfig;
use serde_yaml::Value;

fn compile(source: &str) -> Vec<AutomationRecord> {
    Compiler::default().compile_to_vec(source).unwrap()
}

fn template_of(trigger: &Trigger) -> &str {
    match trigger {
        Trigger::Template(t) => &t.value_template,
        other => panic!("expected template trigger, got {:?}", other),
    }
}

// ============================================================================
// Whole-file compilation
// ============================================================================

#[test]
fn test_house_emits_every_rule_in_source_order() {
    let records = compile_fixture("house.hgl").unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.alias.as_str()).collect();
    assert_eq!(
        names,
        [
            "Porch at night",
            "when sensor.hall_motion is on (line 7) #0",
            "ELSE when sensor.hall_motion is on (line 7) #0",
            "when sensor.stair_motion is on (line 7) #1",
            "ELSE when sensor.stair_motion is on (line 7) #1",
            "when door1,door2 is open (line 9)",
            "ELSE when door1,door2 is open (line 9)",
            "when_fires_doorbell_front (line 11) #0",
            "when_fires_doorbell_back (line 11) #1",
            "when_template (line 13)",
            "mqtt vol_up (line 16)",
            "mqtt media_volume_down (line 17) #0",
            "mqtt channel_down (line 17) #1",
            "media_player.den turn power on",
            "media_player.den turn power off",
            "hgl media_power all_off",
            "start from sunset - 30 minutes to 11:00pm with light.{porch,deck} start: turn_on end: turn_off",
            "end from sunset - 30 minutes to 11:00pm with light.{porch,deck} start: turn_on end: turn_off",
        ]
    );
}

#[test]
fn test_names_are_unique() {
    let records = compile_fixture("house.hgl").unwrap();
    let names: HashSet<&str> = records.iter().map(|r| r.alias.as_str()).collect();
    assert_eq!(names.len(), records.len());
}

#[test]
fn test_condition_from_while_clause() {
    let records = compile_fixture("house.hgl").unwrap();
    let porch = record(&records, "Porch at night");
    assert_eq!(
        porch.conditions(),
        &[Condition::template(
            "{{ states(\"input_boolean.nighttime_dark_mode\") == \"on\" }}"
        )]
    );
    let service = porch.actions()[0].as_service().unwrap();
    assert_eq!(service.service, "switch.turn_on");
    assert_eq!(service.entity_id.as_deref(), Some("switch.relay1"));
}

// ============================================================================
// Expansion fan-out
// ============================================================================

#[test]
fn test_fan_out_cardinality_and_order() {
    let records = compile("when sensor.{a,b,c,d} is motion do light.turn_on(*)\n");
    assert_eq!(records.len(), 4);
    for (index, (record, element)) in records.iter().zip(["a", "b", "c", "d"]).enumerate() {
        assert!(record.alias.ends_with(&format!(" #{}", index)));
        match &record.triggers()[0] {
            Trigger::State(state) => assert_eq!(state.entity_id, format!("sensor.{}", element)),
            other => panic!("unexpected trigger {:?}", other),
        }
        let service = record.actions()[0].as_service().unwrap();
        assert_eq!(service.entity_id, Some(format!("light.{}", element)));
    }
}

#[test]
fn test_numeric_range_expansion() {
    let records = compile("when sensor.zone{1..3} is open do switch.turn_on(siren*)\n");
    let entities: Vec<_> = records
        .iter()
        .map(|r| r.actions()[0].as_service().unwrap().entity_id.clone().unwrap())
        .collect();
    assert_eq!(entities, ["switch.siren1", "switch.siren2", "switch.siren3"]);
}

#[test]
fn test_fan_out_holds_and_else_back_substitution() {
    let records = compile_fixture("house.hgl").unwrap();

    let primary = record(&records, "when sensor.stair_motion is on (line 7) #1");
    match &primary.triggers()[0] {
        Trigger::State(state) => {
            assert_eq!(state.entity_id, "sensor.stair_motion");
            assert_eq!(state.r#for, Some(HoldDuration::Minutes(Amount::Whole(5))));
        }
        other => panic!("unexpected trigger {:?}", other),
    }

    let otherwise = record(&records, "ELSE when sensor.stair_motion is on (line 7) #1");
    match &otherwise.triggers()[0] {
        Trigger::State(state) => {
            assert_eq!(state.to, Some(StateValue::from("off")));
            assert_eq!(state.r#for, Some(HoldDuration::Minutes(Amount::Whole(10))));
        }
        other => panic!("unexpected trigger {:?}", other),
    }
    let service = otherwise.actions()[0].as_service().unwrap();
    assert_eq!(service.service, "light.turn_off");
    assert_eq!(service.entity_id.as_deref(), Some("light.stair_lamp"));
}

#[test]
fn test_event_fan_out_fills_media_url() {
    let records = compile_fixture("house.hgl").unwrap();
    let front = record(&records, "when_fires_doorbell_front (line 11) #0");

    assert_eq!(
        front.triggers()[0],
        Trigger::Event(hgl_automation::EventTrigger {
            event_type: "doorbell_front".into()
        })
    );
    assert_eq!(front.actions().len(), 3);
    let play = front.actions()[0].as_service().unwrap();
    let data = play.data_template.as_ref().unwrap();
    assert_eq!(
        data.get("media_content_id"),
        Some(&DataValue::from(
            "http://localhost:8123/api/camera_proxy_stream/camera.front_live?token={{states.camera.front_live.attributes.access_token}}"
        ))
    );
    assert_eq!(
        data.get("entity_id"),
        Some(&DataValue::from("media_player.kitchen,media_player.den"))
    );
}

// ============================================================================
// Else inversion
// ============================================================================

#[test]
fn test_else_inversion_or_becomes_and() {
    let records = compile_fixture("house.hgl").unwrap();
    let primary = record(&records, "when door1,door2 is open (line 9)");
    let otherwise = record(&records, "ELSE when door1,door2 is open (line 9)");

    assert_eq!(
        template_of(&primary.triggers()[0]),
        "{{is_state(\"sensor.door1\", \"open\") or is_state(\"sensor.door2\", \"open\")}}"
    );
    assert_eq!(
        template_of(&otherwise.triggers()[0]),
        "{{is_state(\"sensor.door1\", \"closed\") and is_state(\"sensor.door2\", \"closed\")}}"
    );
    // `when` keeps the condition on the primary record only
    assert_eq!(primary.conditions().len(), 1);
    assert!(otherwise.condition.is_none());
}

#[test]
fn test_else_inversion_and_becomes_or() {
    let records = compile("when a and b is on while on_vacation do switch.turn_on(x) else off do switch.turn_off(x)\n");
    assert_eq!(records.len(), 2);
    assert_eq!(
        template_of(&records[1].triggers()[0]),
        "{{is_state(\"sensor.a\", \"off\") or is_state(\"sensor.b\", \"off\")}}"
    );
    // `while` carries the condition to the else record
    assert_eq!(records[1].conditions(), records[0].conditions());
}

// ============================================================================
// Domain defaulting
// ============================================================================

#[test]
fn test_domain_defaulting_is_idempotent() {
    let bare = compile("when porch is on do turn_on(switch.relay1)\n");
    let qualified = compile("when sensor.porch is on do switch.turn_on(switch.relay1)\n");
    assert_eq!(bare[0].trigger, qualified[0].trigger);
    assert_eq!(bare[0].action, qualified[0].action);
    assert_eq!(
        bare[0].actions()[0].as_service().unwrap().service,
        "switch.turn_on"
    );
}

#[test]
fn test_fallback_domain_for_bare_service() {
    let records = compile("when porch is on do turn_on(relay1)\n");
    let service = records[0].actions()[0].as_service().unwrap();
    assert_eq!(service.service, "homeassistant.turn_on");
    assert_eq!(service.entity_id.as_deref(), Some("relay1"));
}

// ============================================================================
// MQTT, power and time-range rules
// ============================================================================

#[test]
fn test_mqtt_rules() {
    let records = compile_fixture("house.hgl").unwrap();
    let down = record(&records, "mqtt media_volume_down (line 17) #0");
    assert_eq!(
        down.triggers()[0],
        Trigger::Mqtt(hgl_automation::MqttTrigger {
            topic: "vantage/remote".into()
        })
    );
    assert_eq!(
        down.conditions(),
        &[Condition::template(
            "{{ trigger.payload | trim == \"media_volume_down\" }}"
        )]
    );
    assert_eq!(
        down.actions()[0].as_service().unwrap().service,
        "media_player.volume_down"
    );

    let next = record(&records, "mqtt channel_down (line 17) #1");
    assert_eq!(
        next.actions()[0].as_service().unwrap().service,
        "media_player.next_track"
    );
}

#[test]
fn test_power_rules_share_switches() {
    let records = compile_fixture("house.hgl").unwrap();
    let on = record(&records, "media_player.den turn power on");
    assert_eq!(on.triggers().len(), 3);
    assert_eq!(
        on.actions()[0].as_service().unwrap().entity_id.as_deref(),
        Some("switch.den_amp,switch.den_sub")
    );

    let all_off = record(&records, "hgl media_power all_off");
    assert_eq!(
        all_off.triggers()[0],
        Trigger::Time(hgl_automation::TimeTrigger {
            at: "11:30pm".into()
        })
    );
    let service = all_off.actions()[0].as_service().unwrap();
    assert_eq!(service.service, "homeassistant.turn_off");
    assert_eq!(
        service.entity_id.as_deref(),
        Some("switch.den_amp,switch.den_sub")
    );
}

#[test]
fn test_time_range_with_solar_offset() {
    let records = compile_fixture("house.hgl").unwrap();
    let start = &records[records.len() - 2];
    let end = &records[records.len() - 1];

    assert_eq!(
        template_of(&start.triggers()[0]),
        "{{ (as_timestamp(states.sensor.time.last_changed)/60)|round == (as_timestamp(states.sun.sun.attributes.next_setting)/60)|round - 30 }}"
    );
    let service = start.actions()[0].as_service().unwrap();
    assert_eq!(service.service, "light.turn_on");
    assert_eq!(service.entity_id.as_deref(), Some("light.porch,light.deck"));
    assert_eq!(
        end.actions()[0].as_service().unwrap().service,
        "light.turn_off"
    );
}

#[test]
fn test_template_rule() {
    let records = compile_fixture("house.hgl").unwrap();
    let lux = record(&records, "when_template (line 13)");
    assert_eq!(
        template_of(&lux.triggers()[0]),
        "{{ states('sensor.lux') | int < 50 }}"
    );
}

// ============================================================================
// YAML output
// ============================================================================

fn assert_no_internal_keys(value: &Value) {
    match value {
        Value::Mapping(map) => {
            for (key, inner) in map {
                if let Value::String(key) = key {
                    assert!(!key.starts_with('_'), "internal key '{}' emitted", key);
                }
                assert_no_internal_keys(inner);
            }
        }
        Value::Sequence(items) => items.iter().for_each(assert_no_internal_keys),
        _ => {}
    }
}

#[test]
fn test_yaml_output_shape() {
    let output = emit_fixture("house.hgl");
    assert!(output.starts_with("## THIS FILE WAS GENERATED BY hgl-to-yaml\n## hgl-to-yaml house.hgl\n\n"));

    let value: Value = serde_yaml::from_str(&output).unwrap();
    let records = value.as_sequence().unwrap();
    assert_eq!(records.len(), 18);

    for record in records {
        let keys: Vec<&str> = record
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys[0], "alias");
        assert_eq!(keys[1], "initial_state");
        assert_eq!(keys[2], "trigger");
        assert_eq!(*keys.last().unwrap(), "action");
        assert_eq!(record["initial_state"], Value::Bool(true));
    }
    assert_no_internal_keys(&value);
}

#[test]
fn test_yaml_hold_duration_forms() {
    let output = emit_fixture("house.hgl");
    let value: Value = serde_yaml::from_str(&output).unwrap();
    let hall = &value[1];
    assert_eq!(hall["trigger"]["for"]["minutes"], Value::from(5));
    assert_eq!(hall["trigger"]["to"], Value::from("on"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hgl.yaml");
    std::fs::write(
        &path,
        "base_url: https://hass.example\npower_off_delay_minutes: 30\n",
    )
    .unwrap();

    let config = CompilerConfig::load(&path).unwrap();
    let records = Compiler::new(config)
        .compile_to_vec(&load_fixture("house.hgl"))
        .unwrap();

    let back = record(&records, "when_fires_doorbell_back (line 11) #1");
    let data = back.actions()[0]
        .as_service()
        .unwrap()
        .data_template
        .as_ref()
        .unwrap();
    match data.get("media_content_id") {
        Some(DataValue::Text(url)) => {
            assert!(url.starts_with("https://hass.example/api/camera_proxy_stream/camera.back_live"))
        }
        other => panic!("unexpected media url {:?}", other),
    }

    let off = record(&records, "media_player.den turn power off");
    match &off.triggers()[0] {
        Trigger::State(state) => {
            assert_eq!(state.r#for, Some(HoldDuration::Minutes(Amount::Whole(30))))
        }
        other => panic!("unexpected trigger {:?}", other),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_wildcard_without_braces_is_an_error() {
    match compile_fixture("wildcard_without_braces.hgl") {
        Err(CompileError::UnresolvedWildcard { span, field }) => {
            assert_eq!(span.start_line, 1);
            assert_eq!(field, "action entity");
        }
        other => panic!("expected unresolved wildcard, got {:?}", other),
    }
}

#[test]
fn test_mixed_connectives_are_ambiguous() {
    assert!(matches!(
        compile_fixture("mixed_chain.hgl"),
        Err(CompileError::Ambiguous { .. })
    ));
}

#[test]
fn test_dangling_alias() {
    match compile_fixture("dangling_alias.hgl") {
        Err(CompileError::DanglingAlias { alias, span }) => {
            assert_eq!(alias, "Nothing follows");
            assert_eq!(span.start_line, 3);
        }
        other => panic!("expected dangling alias, got {:?}", other),
    }
}

#[test]
fn test_parse_error_names_position() {
    let err = Compiler::default()
        .compile_to_vec("when light.porch is on do\n")
        .unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
    assert!(err.to_string().starts_with("parse error at line"));
}

#[test]
fn test_names_ignore_trailing_blank_lines_and_comments() {
    let records = compile_fixture("trailing_comments.hgl").unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.alias.as_str()).collect();
    assert_eq!(
        names,
        [
            "when light.porch is on (line 1)",
            "when light.deck is on (lines 5 to 6)"
        ]
    );
}

#[test]
fn test_clock_hold_is_zero_padded() {
    let output = emit_fixture("trailing_comments.hgl");
    let value: Value = serde_yaml::from_str(&output).unwrap();
    assert_eq!(value[1]["trigger"]["for"], Value::from("00:05:00"));
}

#[test]
fn test_wildcard_in_power_switch_is_an_error() {
    match compile_fixture("power_wildcard.hgl") {
        Err(CompileError::UnresolvedWildcard { span, field }) => {
            assert_eq!(span.start_line, 2);
            assert_eq!(field, "action entity");
        }
        other => panic!("expected unresolved wildcard, got {:?}", other),
    }
}

#[test]
fn test_wildcard_media_player_is_an_error() {
    match compile_fixture("power_wildcard_media.hgl") {
        Err(CompileError::UnresolvedWildcard { span, field }) => {
            assert_eq!(span.start_line, 1);
            assert_eq!(field, "trigger entity");
        }
        other => panic!("expected unresolved wildcard, got {:?}", other),
    }
}

#[test]
fn test_brace_template_in_else_action_is_an_error() {
    match compile_fixture("else_brace_template.hgl") {
        Err(CompileError::ElseExpansion { span }) => assert_eq!(span.start_line, 1),
        other => panic!("expected else expansion error, got {:?}", other),
    }
}

#[test]
fn test_bare_wildcard_in_mqtt_action_is_an_error() {
    match compile_fixture("mqtt_bare_wildcard.hgl") {
        Err(CompileError::UnresolvedWildcard { span, field }) => {
            assert_eq!(span.start_line, 2);
            assert_eq!(field, "action service");
        }
        other => panic!("expected unresolved wildcard, got {:?}", other),
    }
}
