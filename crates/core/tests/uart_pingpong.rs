// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use nucleo_config::ScenarioManifest;
use nucleo_core::board::Phase;
use nucleo_core::demos::buffer::PAYLOAD;
use nucleo_core::demos::Fault;
use nucleo_core::hal::uart::UartErrorFlags;
use nucleo_core::signals::DigitalLevel;
use nucleo_core::snapshot::RunOutcome;
use nucleo_core::World;

const PRESS_AT_MS: u64 = 500;

#[test]
fn test_round_trip_passes_on_both_boards() {
    let manifest = ScenarioManifest::uart_pingpong(PRESS_AT_MS);
    let mut world = World::from_manifest(&manifest).unwrap();

    let outcome = world.run_to_completion(5_000).unwrap();
    assert_eq!(outcome, RunOutcome::Pass);
    assert!(world.now_ms() > PRESS_AT_MS);
    assert!(world.now_ms() < 3_000, "took {} ms", world.now_ms());

    let report = world.report();
    let payload = String::from_utf8_lossy(PAYLOAD).into_owned();
    for name in ["tx", "rx"] {
        let board = report.board(name).unwrap();
        assert_eq!(board.status.phase, Phase::Pass);
        assert_eq!(board.led, DigitalLevel::High);
        assert_eq!(board.uart_tx.as_deref(), Some(payload.as_str()));
    }
}

#[test]
fn test_transmitter_waits_for_button() {
    let manifest = ScenarioManifest::uart_pingpong(2_000);
    let mut world = World::from_manifest(&manifest).unwrap();
    world.run_for(1_500).unwrap();

    let tx = world.board("tx").unwrap();
    assert_eq!(tx.status().phase, Phase::WaitingForButton);
    // 100 ms toggling while idle.
    assert!(tx.led_transitions().len() >= 14);
    let rx = world.board("rx").unwrap();
    assert_eq!(rx.status().phase, Phase::RxPending);
    assert!(rx.report().uart_tx.unwrap_or_default().is_empty());
}

#[test]
fn test_corrupted_byte_is_reported_as_mismatch() {
    let mut manifest = ScenarioManifest::uart_pingpong(PRESS_AT_MS);
    manifest.faults.corrupt_byte = Some(10);
    let mut world = World::from_manifest(&manifest).unwrap();

    let outcome = world.run_to_completion(5_000).unwrap();
    assert_eq!(outcome, RunOutcome::Fault);
    assert_eq!(
        world.board("rx").unwrap().status().phase,
        Phase::Fail(Fault::Mismatch {
            index: 10,
            remaining: PAYLOAD.len() - 11,
        })
    );
}

#[test]
fn test_baud_mismatch_is_a_framing_error() {
    let mut manifest = ScenarioManifest::uart_pingpong(PRESS_AT_MS);
    manifest.boards[1].baud_rate = Some(19_200);
    let mut world = World::from_manifest(&manifest).unwrap();

    let outcome = world.run_to_completion(5_000).unwrap();
    assert_eq!(outcome, RunOutcome::Fault);
    match world.board("rx").unwrap().status().phase {
        Phase::Fail(Fault::Transfer { errors }) => {
            assert!(errors.contains(UartErrorFlags::FRAMING))
        }
        other => panic!("unexpected phase {:?}", other),
    }
}

#[test]
fn test_report_serializes_to_json() {
    let manifest = ScenarioManifest::uart_pingpong(PRESS_AT_MS);
    let mut world = World::from_manifest(&manifest).unwrap();
    world.run_to_completion(5_000).unwrap();

    let json = serde_json::to_value(world.report()).unwrap();
    assert_eq!(json["outcome"], "pass");
    assert_eq!(json["boards"][0]["status"]["phase"]["phase"], "pass");
    assert!(json["boards"][1]["peripherals"]["usart2"].is_object());
}
