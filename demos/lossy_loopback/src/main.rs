//! Lossy Loopback Demo
//!
//! Runs one authoritative server and several predicting clients in a single
//! process, connected by a simulated link that drops, duplicates and
//! reorders packets. Prints how far each client's view drifted from the
//! server at the end.
//!
//! ```text
//! cargo run -p lossy_loopback -- --clients 3 --loss 0.2 --duplicate 0.1
//! RUST_LOG=tickwire_netcode=debug cargo run -p lossy_loopback -- --config demos/lossy_loopback/netcode.ron
//! ```

use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;
use tickwire_core::{InputState, NetConfig, NoHooks, SequenceSpace, Vec2};
use tickwire_netcode::{
    decode, encode, AuthoritativeStepper, Channel, ClientWorld, Diagnostic, EntityId, Inbound,
    Inbox, Packet, Snapshot,
};
use tickwire_ring_buffer::BufferStats;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Client prediction and server reconciliation over a lossy link")]
struct Args {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Number of connected clients
    #[arg(long, default_value = "2")]
    clients: u8,

    /// Probability an unreliable packet is lost
    #[arg(long, default_value = "0.1", value_parser = parse_probability)]
    loss: f64,

    /// Probability a packet is delivered twice
    #[arg(long, default_value = "0.05", value_parser = parse_probability)]
    duplicate: f64,

    /// Maximum extra delivery delay in ticks
    #[arg(long, default_value = "3")]
    max_delay: u64,

    /// Seed for the link and the simulated players
    #[arg(long, default_value = "42")]
    seed: u64,

    /// RON file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{p} is not a probability between 0 and 1"))
    }
}

/// A packet on its way to `to`
struct InFlight {
    deliver_at: u64,
    to: usize,
    bytes: Vec<u8>,
}

/// One-directional simulated network
struct Link {
    loss: f64,
    duplicate: f64,
    max_delay: u64,
    in_flight: Vec<InFlight>,
    sent: u64,
    lost: u64,
}

impl Link {
    fn new(args: &Args) -> Self {
        Self {
            loss: args.loss,
            duplicate: args.duplicate,
            max_delay: args.max_delay,
            in_flight: Vec::new(),
            sent: 0,
            lost: 0,
        }
    }

    fn send(
        &mut self,
        rng: &mut StdRng,
        now: u64,
        to: usize,
        packet: &Packet,
        channel: Channel,
    ) -> tickwire_netcode::Result<()> {
        self.sent += 1;
        if channel == Channel::Unreliable && rng.gen_bool(self.loss) {
            self.lost += 1;
            return Ok(());
        }
        let bytes = encode(packet)?;
        let copies = if rng.gen_bool(self.duplicate) { 2 } else { 1 };
        for _ in 0..copies {
            self.in_flight.push(InFlight {
                deliver_at: now + rng.gen_range(0..=self.max_delay),
                to,
                bytes: bytes.clone(),
            });
        }
        Ok(())
    }

    fn deliver(&mut self, now: u64) -> tickwire_netcode::Result<Vec<(usize, Packet)>> {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|p| p.deliver_at <= now);
        self.in_flight = pending;
        due.into_iter()
            .map(|p| Ok((p.to, decode(&p.bytes)?)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct DiagnosticCounts {
    stale: u32,
    prediction_overrun: u32,
    interpolation_overrun: u32,
    anomalous_ack: u32,
}

impl DiagnosticCounts {
    fn record(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::StaleInput { .. } | Diagnostic::StaleSnapshot { .. } => self.stale += 1,
            Diagnostic::PredictionOverrun { .. } => self.prediction_overrun += 1,
            Diagnostic::InterpolationOverrun { .. } => self.interpolation_overrun += 1,
            Diagnostic::AnomalousAck { .. } => self.anomalous_ack += 1,
        }
    }
}

/// Worst prediction buffer occupancy seen by one client
#[derive(Debug, Clone, Copy, Default)]
struct BufferPressure {
    peak_fill: f32,
    peak_span: i32,
}

impl BufferPressure {
    fn record(&mut self, stats: &BufferStats, space: &SequenceSpace) {
        self.peak_fill = self.peak_fill.max(stats.fill_ratio());
        self.peak_span = self.peak_span.max(stats.span(space));
    }
}

fn entity_of(client: usize) -> EntityId {
    EntityId(client as u8 + 1)
}

fn main() -> tickwire_netcode::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => NetConfig::load(path)?,
        None => NetConfig::default(),
    };
    info!(?args, "starting");

    println!("=== Tickwire Lossy Loopback ===\n");
    println!(
        "{} clients, {} ticks at {}Hz, loss {:.0}%, duplicate {:.0}%\n",
        args.clients,
        args.ticks,
        config.tick_rate_hz,
        args.loss * 100.0,
        args.duplicate * 100.0
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut up = Link::new(&args);
    let mut down = Link::new(&args);

    let mut server: AuthoritativeStepper = AuthoritativeStepper::new(&config)?;
    let (server_sender, mut server_inbox) = Inbox::channel();
    let mut clients = Vec::new();
    for i in 0..usize::from(args.clients) {
        server.spawn(entity_of(i), NoHooks)?;
        let mut world = ClientWorld::new(config.clone())?;
        world.login(entity_of(i))?;
        clients.push(world);
    }

    let space = config.sequence_space()?;
    let mut counts = DiagnosticCounts::default();
    let mut pressure = vec![BufferPressure::default(); clients.len()];
    let mut intents = vec![InputState::default(); clients.len()];
    let delta = config.tick_duration();

    for now in 0..u64::from(args.ticks) {
        // Players change their mind about once a second.
        for intent in intents.iter_mut() {
            if rng.gen_bool(f64::from(delta)) {
                let velocity = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
                let facing = if velocity.x < 0.0 { 0.0 } else { 1.0 };
                *intent = InputState::new(velocity, facing, rng.gen_bool(0.2));
            }
        }

        for (i, world) in clients.iter_mut().enumerate() {
            if let Some(local) = world.local_mut() {
                local.set_input(intents[i]);
            }
            let mut outbox: Vec<(Packet, Channel)> = Vec::new();
            let report = world.tick(&mut outbox);
            report.diagnostics.iter().for_each(|d| counts.record(d));
            for (packet, channel) in &outbox {
                up.send(&mut rng, now, i, packet, *channel)?;
            }
            world.render(delta);
            if let Some(local) = world.local() {
                pressure[i].record(&local.buffer().stats(), &space);
            }
        }

        for (from, packet) in up.deliver(now)? {
            server_sender.stage(Inbound::new(entity_of(from), packet));
        }
        server.drain_inbox(&mut server_inbox);

        let mut snapshots: Vec<(Snapshot, Channel)> = Vec::new();
        server.tick(&mut snapshots);
        for (snapshot, channel) in &snapshots {
            for to in 0..clients.len() {
                let owner = entity_of(to) == snapshot.entity_id;
                let wanted = match channel {
                    Channel::Unreliable => !owner,
                    _ => owner,
                };
                if wanted {
                    down.send(&mut rng, now, to, &Packet::State(*snapshot), *channel)?;
                }
            }
        }
        for (to, packet) in down.deliver(now)? {
            clients[to].sender().stage(packet);
        }

        let attacks = server.take_attacks();
        if !attacks.is_empty() {
            tracing::debug!(count = attacks.len(), "attacks requested");
        }
        server.take_dirty_regions();
    }

    println!("Positions (server vs predicted):");
    for (i, world) in clients.iter().enumerate() {
        let id = entity_of(i);
        let Some(state) = server.entity(id) else {
            continue;
        };
        if let Some(local) = world.local() {
            let predicted = local.state().position;
            println!(
                "  {}: server ({:.2}, {:.2}) predicted ({:.2}, {:.2}) drift {:.3}, {} pending",
                id,
                state.position.x,
                state.position.y,
                predicted.x,
                predicted.y,
                state.position.distance(predicted),
                local.buffer().len()
            );
            println!(
                "      peak buffer fill {:.0}%, widest unacknowledged span {} ticks",
                pressure[i].peak_fill * 100.0,
                pressure[i].peak_span
            );
        }
    }

    println!("\nRemote views (drift from server):");
    for (i, world) in clients.iter().enumerate() {
        for remote_id in world.remote_ids() {
            if let (Some(remote), Some(truth)) = (world.remote(remote_id), server.entity(remote_id)) {
                println!(
                    "  {} sees {}: drift {:.3}",
                    entity_of(i),
                    remote_id,
                    truth.position.distance(remote.state().position)
                );
            }
        }
    }

    println!("\nLink:");
    println!("  up:   {} sent, {} lost", up.sent, up.lost);
    println!("  down: {} sent, {} lost", down.sent, down.lost);
    println!("\nDiagnostics: {:?}", counts);
    println!("\n=== Done ===");
    Ok(())
}
