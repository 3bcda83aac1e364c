//! Blast Reveal headless demo
//!
//! Plays a level with a simple auto-aimer and logs what happens.
//! Usage: `blast-reveal [config.json] [seed]` (set `RUST_LOG=debug` for detail)

use blast_reveal::GameConfig;
use blast_reveal::consts::SIM_DT;
use blast_reveal::sim::{
    BombKind, EffectsSink, GameEvent, GameSession, LevelPhase, MaskLayout, PointerEvent, SinkError,
    TickInput, settle, tick,
};
use glam::Vec2;

const HEART: &str = "\
 ##   ##
#### ####
#########
#########
 #######
  #####
   ###
    #
";

/// Forwards interesting events to the log
struct LogSink;

impl EffectsSink for LogSink {
    fn notify(&mut self, event: &GameEvent) -> Result<(), SinkError> {
        match event {
            GameEvent::LevelProgress { percent } => log::info!("Revealed {percent:.1}%"),
            GameEvent::StickyTriggered { pos } => {
                log::info!("Sticky bomb set off at ({:.0}, {:.0})", pos.x, pos.y)
            }
            other => log::debug!("{other:?}"),
        }
        Ok(())
    }
}

/// Pick the drag whose predicted path passes closest to a remaining block
fn choose_pull(session: &mut GameSession) -> Option<Vec2> {
    let anchor = session.launcher.anchor;
    let targets: Vec<Vec2> = session
        .grid
        .iter_active()
        .filter(|(_, b)| !b.is_eternal())
        .map(|(_, b)| b.pos)
        .collect();
    if targets.is_empty() {
        return None;
    }

    session.begin_aim(anchor).ok()?;
    let mut best: Option<(f32, Vec2)> = None;
    for angle_step in 0..24 {
        let angle = std::f32::consts::PI * (0.5 + angle_step as f32 / 48.0);
        for length in [120.0, 150.0, 180.0, 200.0] {
            let pull = Vec2::from_angle(angle) * length;
            session.update_aim(anchor + pull);
            let preview = session.aim_preview();
            let miss = preview
                .iter()
                .flat_map(|p| targets.iter().map(move |t| p.distance(*t)))
                .fold(f32::INFINITY, f32::min);
            if best.is_none_or(|(d, _)| miss < d) {
                best = Some((miss, pull));
            }
        }
    }
    session.cancel_aim();
    best.map(|(_, pull)| pull)
}

fn shoot(session: &mut GameSession, pull: Vec2) {
    let anchor = session.launcher.anchor;
    for pointer in [
        PointerEvent::Down(anchor),
        PointerEvent::Move(anchor + pull),
        PointerEvent::Up(anchor + pull),
    ] {
        let input = TickInput {
            pointer: Some(pointer),
            ..Default::default()
        };
        tick(session, &input, SIM_DT);
    }
}

fn wait_for_bomb(session: &mut GameSession) {
    let idle = TickInput::default();
    for _ in 0..600 {
        if session.active_bomb().is_some() || session.phase != LevelPhase::Playing {
            return;
        }
        tick(session, &idle, SIM_DT);
    }
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match GameConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Failed to load {path}: {err}");
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);

    log::info!("Blast Reveal (headless) starting with seed {seed}");
    let layout = MaskLayout::parse(HEART);
    let mut session = GameSession::new(config, &layout, seed, Some(Box::new(LogSink)));

    let rotation = [BombKind::Blast, BombKind::Cluster, BombKind::Shatterer, BombKind::Piercer];
    let mut shot = 0;
    while session.phase == LevelPhase::Playing {
        wait_for_bomb(&mut session);
        if session.phase != LevelPhase::Playing {
            break;
        }
        session.select_bomb(rotation[shot % rotation.len()]);
        shot += 1;

        let Some(pull) = choose_pull(&mut session) else {
            log::warn!("Nothing left to aim at");
            break;
        };
        shoot(&mut session, pull);
        settle(&mut session, SIM_DT, 20_000);
        session.update_phase();
    }

    let stats = session.stats();
    log::info!(
        "Level {} ended {:?} at {:.1}% after {} ticks: {} blocks destroyed, \
         {} explosions ({} chained), {} fizzles",
        session.level,
        session.phase,
        session.reveal_percentage(),
        session.time_ticks,
        stats.blocks_destroyed,
        stats.explosions,
        stats.chain_explosions,
        stats.fizzles
    );
}
