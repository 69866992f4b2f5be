//! Performance benchmarks for critical game systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::mob::{MobMirror, MobTable};
use shared::{
    integrate, Body, InputState, Message, Mob, MobKind, PlayerUpdate, Vec2, MAX_DISTANCE,
    MAX_MOBS, PROXIMITY_THRESHOLD,
};
use std::time::{Duration, Instant};

/// Benchmarks the damped Euler step used for prediction
#[test]
fn benchmark_physics_integration() {
    let input = InputState {
        left: false,
        right: true,
        up: false,
        down: true,
    };
    let mut bodies: Vec<Body> = (0..100)
        .map(|i| {
            let mut body = Body::at(Vec2::new(i as f32 * 10.0, 100.0));
            body.acceleration = input.acceleration();
            body
        })
        .collect();

    let dt = 1.0 / 60.0;
    let iterations = 1000;
    let start = Instant::now();

    for _ in 0..iterations {
        for body in &mut bodies {
            integrate(body, dt);
            body.position = body.position.clamp_to_world();
        }
    }

    let duration = start.elapsed();
    println!(
        "Physics integration: {} bodies × {} frames in {:?} ({:.2} μs/frame)",
        bodies.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks wire encoding and decoding of snapshot messages
#[test]
fn benchmark_message_codec() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut messages = vec![Message::SnapshotBegin { tick: 12345 }];
    messages.extend((0..32).map(|i| {
        Message::PlayerUpdate(PlayerUpdate {
            x: i as f32 * 10.0,
            y: 100.0,
            vx: 1.0,
            vy: -1.0,
        })
    }));
    messages.extend(
        (0..MAX_MOBS).map(|_| Message::MobUpdate(Mob::spawn(MobKind::Ladybug, &mut rng).to_update())),
    );

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for message in &messages {
            let bytes = message.encode().unwrap();
            let decoded = Message::decode(&bytes).unwrap();
            assert_eq!(decoded.kind(), message.kind());
        }
    }

    let duration = start.elapsed();
    println!(
        "Message codec: {} snapshots of {} messages in {:?} ({:.2} μs/snapshot)",
        iterations,
        messages.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the server mob simulation at full capacity
#[test]
fn benchmark_mob_table_tick() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut table = MobTable::new(MAX_MOBS);
    for i in 0..MAX_MOBS {
        table.spawn_random(MobKind::ALL[i % MobKind::ALL.len()], &mut rng);
    }

    let dt = 1.0 / 60.0;
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        table.tick(dt);
    }

    let duration = start.elapsed();
    println!(
        "Mob table tick: {} mobs × {} ticks in {:?} ({:.2} μs/tick)",
        table.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(table.len(), MAX_MOBS);
    assert!(duration.as_millis() < 2000);
}

/// Stress tests proximity reconciliation with a full mirror
#[test]
fn stress_test_mob_reconciliation() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut table = MobTable::new(MAX_MOBS);
    for _ in 0..MAX_MOBS {
        table.spawn_random(MobKind::Ladybug, &mut rng);
    }

    let mut mirror = MobMirror::new();
    let player = Vec2::new(800.0, 600.0);
    let dt = 1.0 / 60.0;
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        table.tick(dt);
        for mob in table.as_slice() {
            mirror.reconcile(*mob, PROXIMITY_THRESHOLD);
        }
        mirror.evict(player, MAX_DISTANCE, MAX_MOBS);
    }

    let duration = start.elapsed();
    println!(
        "Mob reconciliation: {} snapshots in {:?} ({:.2} μs/snapshot)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(mirror.len() <= MAX_MOBS);
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks a full server tick broadcasting to several in-memory clients
#[test]
fn benchmark_server_broadcast() {
    use client::config::ClientConfig;
    use client::network::Client;
    use server::config::ServerConfig;
    use server::network::Server;
    use shared::transport::memory::MemoryHub;

    let config = ServerConfig {
        seed: Some(5),
        seed_mobs: 50,
        spawn_chance: 0.0,
        ..ServerConfig::default()
    };
    let tick_time = config.tick_duration() + Duration::from_millis(1);

    let hub = MemoryHub::new();
    let mut server = Server::new(hub.host(), config).unwrap();

    let mut clients: Vec<_> = (0..8)
        .map(|_| {
            let mut transport = hub.host();
            let to_server = transport.connect(server.transport());
            let mut client = Client::new(transport, to_server, ClientConfig::default());
            client.connect(Duration::from_millis(100)).unwrap();
            client
        })
        .collect();

    let idle = InputState::default();
    let iterations = 200;
    let start = Instant::now();

    for _ in 0..iterations {
        for client in &mut clients {
            client.frame(&idle, 1.0 / 60.0).unwrap();
        }
        server.step(tick_time).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Server broadcast: {} clients × {} ticks in {:?} ({:.2} μs/tick)",
        clients.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    for client in &mut clients {
        client.frame(&idle, 1.0 / 60.0).unwrap();
        assert_eq!(client.game_state().remote.len(), 7);
    }
    assert!(duration.as_millis() < 5000);
}
