use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use saavy_sampler::{
    bus::{ClientCommand, EngineNotification, MessageBus},
    engine::BlockDriver,
    ids::GroupId,
    patch::{slots::AdsrConfig, KeyRange, ZoneAddress, ZoneConfig},
    sample::{Sample, SampleId, SampleStore},
    synth::StealPolicy,
    Engine, EngineConfig, StereoBlock,
};

fn tone(store: &SampleStore) -> SampleId {
    store.register(Sample::mono("tone", 48_000.0, vec![0.25; 48_000]))
}

fn engine_with_store(config: EngineConfig) -> (Engine, Arc<SampleStore>, SampleId) {
    let store = Arc::new(SampleStore::new());
    let sample = tone(&store);
    let engine = Engine::new(config, store.clone()).unwrap();
    (engine, store, sample)
}

fn add_zone(engine: &mut Engine, group: GroupId, config: ZoneConfig) -> ZoneAddress {
    let zone = engine.add_zone(group, config).unwrap();
    engine.patch().find_zone(zone).unwrap()
}

#[test]
fn single_key_zone_counts_follow_the_note() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "keys").unwrap();
    let address = add_zone(
        &mut engine,
        group,
        ZoneConfig::new(Some(sample), KeyRange::new(60, 60), 60),
    );

    assert_eq!(engine.note_on(0, 60, 1, 1.0, 0.0), 1);
    let patch = engine.patch();
    assert_eq!(patch.zone(address).active_voice_count(), 1);
    assert_eq!(patch.part(0).group(0).active_zone_count(), 1);
    assert_eq!(patch.part(0).active_group_count(), 1);
    assert_eq!(patch.active_part_count(), 1);

    let mut out = StereoBlock::silent();
    engine.process_audio(&mut out);
    engine.note_off(0, 60, 1);
    engine.process_audio(&mut out);
    assert_eq!(
        engine.patch().zone(address).active_voice_count(),
        1,
        "release tail still sounding"
    );

    // Default release is 50 ms, roughly 38 blocks at 48 kHz
    for _ in 0..100 {
        engine.process_audio(&mut out);
    }
    let patch = engine.patch();
    assert_eq!(patch.zone(address).active_voice_count(), 0);
    assert_eq!(patch.part(0).group(0).active_zone_count(), 0);
    assert_eq!(patch.part(0).active_group_count(), 0);
    assert_eq!(patch.active_part_count(), 0);
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn keys_outside_every_zone_start_nothing() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "keys").unwrap();
    add_zone(&mut engine, group, ZoneConfig::new(Some(sample), KeyRange::new(60, 72), 60));

    assert_eq!(engine.note_on(0, 59, 1, 1.0, 0.0), 0);
    assert_eq!(engine.note_on(0, -3, 2, 1.0, 0.0), 0);
    assert_eq!(engine.note_on(5, 60, 3, 1.0, 0.0), 0, "part 0 listens on channel 0 only");
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn idle_patch_renders_silence() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(3, "idle").unwrap();
    add_zone(&mut engine, group, ZoneConfig::new(Some(sample), KeyRange::full(), 60));

    let mut out = StereoBlock::silent();
    out.left[0] = 1.0;
    engine.process_audio(&mut out);
    assert!(out.is_silent());
    assert_eq!(engine.patch().active_part_count(), 0);
}

#[test]
fn engine_output_is_the_single_voice_output() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "g").unwrap();
    let mut config = ZoneConfig::new(Some(sample), KeyRange::full(), 60);
    config.amp_eg = AdsrConfig::new(0.0, 0.0, 1.0, 0.01);
    add_zone(&mut engine, group, config);

    engine.note_on(0, 60, 1, 0.8, 0.0);
    let mut out = StereoBlock::silent();
    engine.process_audio(&mut out);

    let slot = engine.pool().busy_slots().next().unwrap();
    assert!(engine.pool().voice(slot).is_playing());
    assert!(!out.is_silent());
    assert_eq!(&out, engine.pool().voice(slot).output());
}

#[test]
fn overlapping_zones_all_sound() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let layer_a = engine.add_group(0, "a").unwrap();
    let layer_b = engine.add_group(0, "b").unwrap();
    let a = add_zone(&mut engine, layer_a, ZoneConfig::new(Some(sample), KeyRange::new(40, 80), 60));
    let b = add_zone(&mut engine, layer_b, ZoneConfig::new(Some(sample), KeyRange::new(60, 100), 60));

    assert_eq!(engine.note_on(0, 70, 1, 1.0, 0.0), 2);
    assert_eq!(engine.patch().zone(a).active_voice_count(), 1);
    assert_eq!(engine.patch().zone(b).active_voice_count(), 1);
    assert_eq!(engine.patch().part(0).active_group_count(), 2);
}

#[test]
fn stealing_prefers_released_voices() {
    let config = EngineConfig {
        max_voices: 3,
        steal_policy: StealPolicy::ReleasedThenOldest,
        ..EngineConfig::default()
    };
    let (mut engine, _, sample) = engine_with_store(config);
    let group = engine.add_group(0, "g").unwrap();
    let mut zone = ZoneConfig::new(Some(sample), KeyRange::full(), 60);
    zone.amp_eg = AdsrConfig::new(0.0, 0.0, 1.0, 1.0);
    add_zone(&mut engine, group, zone);

    engine.note_on(0, 60, 1, 1.0, 0.0);
    engine.note_on(0, 61, 2, 1.0, 0.0);
    engine.note_on(0, 62, 3, 1.0, 0.0);
    // 61 is released but its tail is long; it is the one to go
    engine.note_off(0, 61, 2);

    assert_eq!(engine.note_on(0, 63, 4, 1.0, 0.0), 1);
    let keys: Vec<i32> = engine
        .pool()
        .busy_slots()
        .map(|slot| engine.pool().voice(slot).key())
        .collect();
    assert!(keys.contains(&60));
    assert!(!keys.contains(&61));
    assert!(keys.contains(&62));
    assert!(keys.contains(&63));
}

#[test]
fn refused_notes_are_reported_on_the_bus() {
    let config = EngineConfig {
        max_voices: 1,
        steal_policy: StealPolicy::Refuse,
        ..EngineConfig::default()
    };
    let (mut engine, _, sample) = engine_with_store(config);
    let group = engine.add_group(0, "g").unwrap();
    add_zone(&mut engine, group, ZoneConfig::new(Some(sample), KeyRange::full(), 60));

    let (bus, endpoint) = MessageBus::new();
    engine.attach_bus(endpoint);
    let (tx, rx) = mpsc::channel();
    let mut client = bus.register_client("monitor", move |n| tx.send(n).unwrap()).unwrap();

    engine.note_on(0, 60, 1, 1.0, 0.0);
    engine.note_on(0, 64, 2, 1.0, 0.0);
    client.pump();

    assert!(rx.try_iter().any(|n| matches!(
        n,
        EngineNotification::NoteDropped { key: 64, note_id: 2, .. }
    )));
}

#[test]
fn commands_over_the_bus_edit_the_patch() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let (bus, endpoint) = MessageBus::new();
    engine.attach_bus(endpoint);
    let (tx, rx) = mpsc::channel();
    let mut editor = bus.register_client("editor", move |n| tx.send(n).unwrap()).unwrap();
    let mut out = StereoBlock::silent();

    editor
        .post(&ClientCommand::AddGroup {
            part: 2,
            name: "strings".into(),
        })
        .unwrap();
    engine.run_block(&mut out);
    editor.pump();
    let group = match rx.try_recv().unwrap() {
        EngineNotification::GroupAdded { part: 2, group, .. } => group,
        other => panic!("unexpected {other:?}"),
    };

    editor
        .post(&ClientCommand::AddZone {
            group,
            config: ZoneConfig::new(Some(sample), KeyRange::new(48, 72), 60),
        })
        .unwrap();
    editor
        .post(&ClientCommand::NoteOn {
            channel: 2,
            key: 60,
            note_id: 9,
            velocity: 1.0,
            detune: 0.0,
        })
        .unwrap();
    engine.run_block(&mut out);
    editor.pump();

    let received: Vec<_> = rx.try_iter().collect();
    assert!(matches!(received[0], EngineNotification::ZoneAdded { group: g, .. } if g == group));
    assert!(matches!(received[1], EngineNotification::VoiceActivity { active_voices: 1 }));
    assert!(!out.is_silent());
}

#[test]
fn state_round_trips_once_samples_are_registered_again() {
    let (mut engine, store, sample) = engine_with_store(EngineConfig {
        max_voices: 12,
        ..EngineConfig::default()
    });
    let group = engine.add_group(1, "g").unwrap();
    add_zone(&mut engine, group, ZoneConfig::new(Some(sample), KeyRange::new(30, 90), 60));
    let document = engine.serialize_state().unwrap();
    drop(store);

    // Fresh process: register the sample under its saved id first
    let restored_store = Arc::new(SampleStore::new());
    restored_store.register_with_id(sample, Sample::mono("tone", 48_000.0, vec![0.25; 48_000]));
    let mut restored = Engine::new(EngineConfig::default(), restored_store).unwrap();
    let missing = restored.load_state(&document).unwrap();

    assert!(missing.is_empty());
    assert_eq!(restored.config().max_voices, 12);
    assert_eq!(restored.pool().capacity(), 12);
    assert!(restored.patch().same_structure(engine.patch()));
    assert_eq!(restored.note_on(1, 60, 1, 1.0, 0.0), 1);

    // Without the sample the zones load but stay silent
    let mut bare = Engine::new(EngineConfig::default(), Arc::new(SampleStore::new())).unwrap();
    assert_eq!(bare.load_state(&document).unwrap(), vec![sample]);
    assert_eq!(bare.patch().zone_count(), 1);
}

#[test]
fn new_ids_after_a_load_do_not_collide() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "g").unwrap();
    let first = engine
        .add_zone(group, ZoneConfig::new(Some(sample), KeyRange::full(), 60))
        .unwrap();
    let document = engine.serialize_patch().unwrap();

    let mut other = Engine::new(EngineConfig::default(), Arc::new(SampleStore::new())).unwrap();
    other.load_patch(&document).unwrap();
    let loaded_group = other.patch().part(0).group(0).id();
    let second = other
        .add_zone(loaded_group, ZoneConfig::default())
        .unwrap();
    assert_ne!(first, second);
}

#[cfg(feature = "rtrb")]
#[test]
fn realtime_note_input_is_drained_each_block() {
    use saavy_sampler::synth::message::SynthMessage;

    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "g").unwrap();
    add_zone(&mut engine, group, ZoneConfig::new(Some(sample), KeyRange::full(), 60));

    let (mut producer, consumer) = rtrb::RingBuffer::<SynthMessage>::new(16);
    engine.set_note_input(consumer);
    producer
        .push(SynthMessage::NoteOn {
            channel: 0,
            key: 67,
            note_id: 1,
            velocity: 1.0,
            detune: 0.0,
        })
        .unwrap();

    let mut out = StereoBlock::silent();
    engine.run_block(&mut out);
    assert_eq!(engine.active_voice_count(), 1);
    assert!(!out.is_silent());
}

#[test]
fn driver_thread_answers_clients_and_shuts_down() {
    let (mut engine, _, sample) = engine_with_store(EngineConfig::default());
    let group = engine.add_group(0, "g").unwrap();
    let mut zone = ZoneConfig::new(Some(sample), KeyRange::full(), 60);
    zone.looping = true;
    add_zone(&mut engine, group, zone);

    let (bus, endpoint) = MessageBus::new();
    engine.attach_bus(endpoint);
    let (tx, rx) = mpsc::channel();
    let mut client = bus.register_client("remote", move |n| tx.send(n).unwrap()).unwrap();

    let driver = BlockDriver::spawn(engine, |_| {}).unwrap();
    client
        .post(&ClientCommand::NoteOn {
            channel: 0,
            key: 60,
            note_id: 1,
            velocity: 1.0,
            detune: 0.0,
        })
        .unwrap();
    client.post(&ClientCommand::Shutdown).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !driver.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(driver.is_finished(), "shutdown should end the loop");
    let engine = driver.stop().unwrap();
    client.pump();

    let received: Vec<_> = rx.try_iter().collect();
    assert!(received
        .iter()
        .any(|n| matches!(n, EngineNotification::ShuttingDown)));
    assert!(!engine.is_running());
    assert_eq!(engine.active_voice_count(), 1);
}
