use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mafia::{
    Game, GameRules,
    entities::{NightActionKind, PlayerId, Role},
    roles::RoleDealer,
};

/// Helper to create a started game with N players
fn setup_game_with_players(n_players: usize) -> Game {
    let mut game = Game::new(
        "bench".to_string(),
        PlayerId::new("player0"),
        GameRules::default(),
        RoleDealer::seeded(1),
    );
    for i in 1..n_players {
        game.join(PlayerId::new(&format!("player{i}"))).unwrap();
    }
    game.start().unwrap();
    game.drain_events();
    game
}

/// Submit every night action of the current night, mafia aiming at the
/// first non-mafia player and the doctor protecting themselves
fn play_night(game: &mut Game) {
    let victim = game
        .players()
        .iter()
        .find(|p| p.alive && !p.is_mafia())
        .map(|p| p.id.clone())
        .unwrap();
    let actors: Vec<(PlayerId, Role)> = game
        .players()
        .iter()
        .filter(|p| p.alive && p.has_night_ability())
        .map(|p| (p.id.clone(), p.role.unwrap()))
        .collect();

    for (actor, role) in actors {
        let (kind, target) = match role {
            Role::Doctor => (NightActionKind::Save, actor.clone()),
            Role::Detective => (NightActionKind::Inspect, victim.clone()),
            _ => (NightActionKind::Eliminate, victim.clone()),
        };
        game.submit_night_action(actor, kind, target).unwrap();
    }
}

/// Benchmark role dealing
fn bench_deal_roles(c: &mut Criterion) {
    let mut group = c.benchmark_group("deal_roles");
    let mut dealer = RoleDealer::seeded(7);

    for n in [5, 6, 7, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| dealer.deal(n));
        });
    }

    group.finish();
}

/// Benchmark a full night from first action to resolution
fn bench_night_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("night_resolution");

    for n in [5, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || setup_game_with_players(n),
                |mut game| {
                    play_night(&mut game);
                    game
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark a full day of votes from first ballot to resolution
fn bench_day_resolution(c: &mut Criterion) {
    c.bench_function("day_resolution_8_players", |b| {
        b.iter_batched(
            || {
                let mut game = setup_game_with_players(8);
                play_night(&mut game);
                game
            },
            |mut game| {
                let alive: Vec<PlayerId> = game
                    .players()
                    .iter()
                    .filter(|p| p.alive)
                    .map(|p| p.id.clone())
                    .collect();
                let target = alive[alive.len() - 1].clone();
                for voter in alive {
                    game.submit_vote(voter, target.clone()).unwrap();
                }
                game
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark per-player view generation
fn bench_view_generation(c: &mut Criterion) {
    let game = setup_game_with_players(8);
    let viewer = PlayerId::new("player3");

    c.bench_function("view_for_player", |b| {
        b.iter(|| game.view_for(Some(&viewer)));
    });

    c.bench_function("snapshot", |b| {
        b.iter(|| game.snapshot());
    });
}

criterion_group!(dealing, bench_deal_roles);

criterion_group!(
    game_operations,
    bench_night_resolution,
    bench_day_resolution,
    bench_view_generation,
);

criterion_main!(dealing, game_operations);
