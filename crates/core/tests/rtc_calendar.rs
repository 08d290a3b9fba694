// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use nucleo_config::{RtcClockSource, RtcSettings, ScenarioKind, ScenarioManifest};
use nucleo_core::board::{BoardStatus, Phase};
use nucleo_core::demos::Fault;
use nucleo_core::ll;
use nucleo_core::signals::DigitalLevel;
use nucleo_core::snapshot::RunOutcome;
use nucleo_core::world::BoardAction;
use nucleo_core::World;

const BOARD: &str = "nucleo";

fn calendar_world(rtc: RtcSettings) -> World {
    let manifest = ScenarioManifest::rtc(ScenarioKind::RtcCalendar, rtc, 60_000);
    World::from_manifest(&manifest).unwrap()
}

fn status(world: &World) -> BoardStatus {
    world.board(BOARD).unwrap().status()
}

fn run_until_running(world: &mut World) {
    let reached = world
        .run_until(10_000, |w| status(w).phase == Phase::Running)
        .unwrap();
    assert!(reached, "board stuck in {:?}", status(world).phase);
}

#[test]
fn test_first_boot_programs_calendar() {
    let mut world = calendar_world(RtcSettings::default());
    run_until_running(&mut world);

    let s = status(&world);
    assert!(s.calendar_configured);
    let calendar = s.calendar.unwrap();
    assert_eq!(calendar.time, "23:59:55");
    assert_eq!(calendar.date, "03-31-2015");
    assert_eq!(world.board(BOARD).unwrap().led(), DigitalLevel::High);

    // Shadow registers resynchronised after leaving init mode.
    let board = world.board(BOARD).unwrap();
    assert!(board
        .context()
        .with_mcu(ll::rtc::is_active_flag_rs)
        .unwrap());
    assert!(!board
        .context()
        .with_mcu(ll::rtc::is_active_flag_init)
        .unwrap());
}

#[test]
fn test_calendar_rolls_into_april() {
    let mut world = calendar_world(RtcSettings::default());
    run_until_running(&mut world);
    world.run_for(6_000).unwrap();

    let calendar = status(&world).calendar.unwrap();
    assert_eq!(calendar.date, "04-01-2015");
    assert!(calendar.time.starts_with("00:00:0"), "{}", calendar.time);
}

#[test]
fn test_reset_keeps_running_calendar() {
    let mut world = calendar_world(RtcSettings::default());
    run_until_running(&mut world);
    world.run_for(3_000).unwrap();

    world.schedule(world.now_ms(), BOARD, BoardAction::Reset);
    world.run_for(1).unwrap();
    assert_eq!(status(&world).phase, Phase::ClockConfig);
    run_until_running(&mut world);

    let s = status(&world);
    assert!(!s.calendar_configured);
    let calendar = s.calendar.unwrap();
    assert_ne!(calendar.time, "23:59:55");
    assert!(calendar.time.starts_with("23:59:5"), "{}", calendar.time);
    assert_eq!(world.board(BOARD).unwrap().resets(), 1);
}

#[test]
fn test_power_cycle_reprograms_calendar() {
    let mut world = calendar_world(RtcSettings::default());
    run_until_running(&mut world);
    world.run_for(3_000).unwrap();

    world.schedule(world.now_ms(), BOARD, BoardAction::PowerCycle);
    world.run_for(1).unwrap();
    run_until_running(&mut world);

    let s = status(&world);
    assert!(s.calendar_configured);
    assert_eq!(s.calendar.unwrap().time, "23:59:55");
}

#[test]
fn test_lsi_clock_source() {
    let mut world = calendar_world(RtcSettings {
        clock_source: RtcClockSource::Lsi,
        use_timeout: true,
    });
    run_until_running(&mut world);
    world.run_for(2_000).unwrap();

    let calendar = status(&world).calendar.unwrap();
    assert!(calendar.time.starts_with("23:59:5"), "{}", calendar.time);
    assert_ne!(calendar.time, "23:59:55");
}

#[test]
fn test_dead_crystal_times_out_when_checked() {
    let mut manifest = ScenarioManifest::rtc(
        ScenarioKind::RtcCalendar,
        RtcSettings {
            clock_source: RtcClockSource::Lse,
            use_timeout: true,
        },
        8_000,
    );
    manifest.boards[0].oscillators.lse_fails = true;
    let mut world = World::from_manifest(&manifest).unwrap();

    assert_eq!(world.run_to_completion(8_000).unwrap(), RunOutcome::Fault);
    assert_eq!(
        status(&world).phase,
        Phase::Fail(Fault::Timeout {
            what: "LSERDY".to_string(),
            polls: 5_000,
        })
    );
    // Fault blink: 1 s half period.
    world.run_for(2_500).unwrap();
    let transitions = world.board(BOARD).unwrap().led_transitions();
    assert!(transitions.len() >= 2);
    let last = &transitions[transitions.len() - 2..];
    assert_eq!(last[1].at_ms - last[0].at_ms, 1_000);
}

#[test]
fn test_dead_crystal_hangs_without_timeout() {
    let mut manifest =
        ScenarioManifest::rtc(ScenarioKind::RtcCalendar, RtcSettings::default(), 8_000);
    manifest.boards[0].oscillators.lse_fails = true;
    let mut world = World::from_manifest(&manifest).unwrap();

    assert_eq!(world.run_to_completion(8_000).unwrap(), RunOutcome::Running);
    assert_eq!(status(&world).phase, Phase::ClockConfig);
}

#[test]
fn test_unclocked_rtc_never_enters_init_mode() {
    let mut manifest = ScenarioManifest::rtc(
        ScenarioKind::RtcCalendar,
        RtcSettings {
            clock_source: RtcClockSource::Lse,
            use_timeout: true,
        },
        5_000,
    );
    manifest.boards[0].oscillators.rtc_clock_stuck = true;
    let mut world = World::from_manifest(&manifest).unwrap();

    assert_eq!(world.run_to_completion(5_000).unwrap(), RunOutcome::Fault);
    assert_eq!(
        status(&world).phase,
        Phase::Fail(Fault::Timeout {
            what: "RTC INITF".to_string(),
            polls: 1_000,
        })
    );
}

fn timeout_manifest(clock_source: RtcClockSource) -> ScenarioManifest {
    ScenarioManifest::rtc(
        ScenarioKind::RtcCalendar,
        RtcSettings {
            clock_source,
            use_timeout: true,
        },
        5_000,
    )
}

#[test]
fn test_dead_lsi_times_out_after_two_polls() {
    let mut manifest = timeout_manifest(RtcClockSource::Lsi);
    manifest.boards[0].oscillators.lsi_fails = true;
    let mut world = World::from_manifest(&manifest).unwrap();

    assert_eq!(world.run_to_completion(5_000).unwrap(), RunOutcome::Fault);
    assert_eq!(
        status(&world).phase,
        Phase::Fail(Fault::Timeout {
            what: "LSIRDY".to_string(),
            polls: 2,
        })
    );
    assert!(!status(&world).calendar_configured);
}

#[test]
fn test_missing_resync_times_out_on_rsf() {
    let mut manifest = timeout_manifest(RtcClockSource::Lsi);
    manifest.boards[0].oscillators.rtc_sync_stuck = true;
    let mut world = World::from_manifest(&manifest).unwrap();

    assert_eq!(world.run_to_completion(5_000).unwrap(), RunOutcome::Fault);
    assert_eq!(
        status(&world).phase,
        Phase::Fail(Fault::Timeout {
            what: "RTC RSF".to_string(),
            polls: 1_000,
        })
    );
    // Init mode itself was acknowledged; only the resync is missing.
    let ctx = world.board(BOARD).unwrap().context();
    assert!(!ctx.with_mcu(ll::rtc::is_active_flag_rs).unwrap());
    assert!(!ctx.with_mcu(ll::rtc::is_active_flag_init).unwrap());
}
