use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardctl::{Config, ConfigModel, Gid, Op, Status, N_SHARDS, UNASSIGNED};
use std::collections::BTreeMap;

fn join_op(entries: &[(Gid, &str)]) -> Op {
    let mut servers: BTreeMap<Gid, Vec<String>> = BTreeMap::new();
    for (gid, server) in entries {
        servers.entry(*gid).or_default().push(server.to_string());
    }
    Op::Join { servers }
}

fn counts(config: &Config) -> BTreeMap<Gid, usize> {
    config.shard_counts()
}

fn random_op(rng: &mut StdRng) -> Op {
    match rng.gen_range(0..10) {
        0..=3 => {
            let groups = rng.gen_range(1..=3);
            let entries: Vec<(Gid, String)> = (0..groups)
                .map(|_| {
                    let gid = rng.gen_range(1..=8);
                    (gid, format!("server-{}-{}", gid, rng.gen_range(0..4)))
                })
                .collect();
            let mut servers: BTreeMap<Gid, Vec<String>> = BTreeMap::new();
            for (gid, server) in entries {
                servers.entry(gid).or_default().push(server);
            }
            Op::Join { servers }
        }
        4..=6 => {
            let count = rng.gen_range(1..=2);
            Op::Leave {
                gids: (0..count).map(|_| rng.gen_range(1..=9)).collect(),
            }
        }
        7..=8 => Op::Move {
            shard: rng.gen_range(0..N_SHARDS),
            gid: rng.gen_range(0..=9),
        },
        _ => Op::Query {
            num: rng.gen_range(-2..40),
        },
    }
}

#[test]
fn walkthrough_join_leave_move_query() {
    let mut model = ConfigModel::new(0);

    // Fresh model
    let initial = model.query(-1);
    assert_eq!(initial.num, 0);
    assert_eq!(initial.shards, [UNASSIGNED; N_SHARDS]);
    assert!(initial.groups.is_empty());

    // First group takes everything
    assert!(model.apply(join_op(&[(100, "s1")])).is_ok());
    let first = model.query(-1);
    assert_eq!(first.num, 1);
    assert_eq!(first.shards, [100; N_SHARDS]);
    assert_eq!(first.groups[&100], vec!["s1".to_string()]);

    // Two more groups
    assert!(model.apply(join_op(&[(101, "s2"), (102, "s3")])).is_ok());
    let second = model.query(-1);
    assert_eq!(second.num, 2);
    assert!(second.is_balanced());
    assert_eq!(second.unassigned_count(), 0);
    for count in counts(&second).values() {
        assert!(*count == 3 || *count == 4);
    }

    // Group 100 leaves
    assert!(model.apply(Op::Leave { gids: vec![100] }).is_ok());
    let third = model.query(-1);
    assert_eq!(third.num, 3);
    assert!(!third.has_group(100));
    assert_eq!(counts(&third), BTreeMap::from([(101, 5), (102, 5)]));

    // Manual move ignores balance
    assert!(model.apply(Op::Move { shard: 3, gid: 101 }).is_ok());
    let fourth = model.query(-1);
    assert_eq!(fourth.num, 4);
    assert_eq!(fourth.shards[3], 101);
    for shard in (0..N_SHARDS).filter(|&s| s != 3) {
        assert_eq!(fourth.shards[shard], third.shards[shard]);
    }
    assert_eq!(fourth.groups, third.groups);

    // Config #3 is unaffected by the move
    let reply = model.apply(Op::Query { num: 3 });
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(reply.config, third);
}

#[test]
fn identical_command_sequences_build_identical_histories() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let ops: Vec<Op> = (0..60).map(|_| random_op(&mut rng)).collect();

        let mut a = ConfigModel::new(1);
        let mut b = ConfigModel::new(2);
        for op in &ops {
            let reply_a = a.apply(op.clone());
            let reply_b = b.apply(op.clone());
            assert_eq!(reply_a, reply_b, "seed {} diverged on {:?}", seed, op);
        }

        assert_eq!(a.history().snapshot(), b.history().snapshot(), "seed {}", seed);
    }
}

#[test]
fn join_and_leave_keep_shards_balanced_and_drained() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut model = ConfigModel::new(0);

    for _ in 0..500 {
        let op = random_op(&mut rng);
        let before = model.latest();
        let rebalances = matches!(op, Op::Join { .. } | Op::Leave { .. });
        let moved = match op {
            Op::Move { shard, gid } => Some((shard, gid)),
            _ => None,
        };

        assert!(model.apply(op).is_ok());
        let after = model.latest();

        if rebalances {
            assert!(after.is_balanced(), "unbalanced config {:?}", after);
            if !after.groups.is_empty() {
                assert_eq!(after.unassigned_count(), 0);
            }
        }

        if let Some((shard, gid)) = moved {
            assert_eq!(after.num, before.num + 1);
            assert_eq!(after.shards[shard], gid);
            assert_eq!(after.groups, before.groups);
            for other in (0..N_SHARDS).filter(|&s| s != shard) {
                assert_eq!(after.shards[other], before.shards[other]);
            }
        }
    }
}

#[test]
fn committed_configs_never_change() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut model = ConfigModel::new(0);
    let mut seen = vec![model.query(0)];

    for _ in 0..100 {
        let op = random_op(&mut rng);
        let mutation = op.is_mutation();
        model.apply(op);
        if mutation {
            seen.push(model.query(-1));
        }
    }

    assert_eq!(model.history().len(), seen.len());
    for (num, config) in seen.iter().enumerate() {
        assert_eq!(&model.query(num as i64), config);
        assert_eq!(config.num, num as u64);
    }
}

#[test]
fn out_of_range_queries_return_latest() {
    let mut model = ConfigModel::new(0);
    model.apply(join_op(&[(1, "a")]));
    model.apply(join_op(&[(2, "b")]));

    let latest = model.query((model.history().len() - 1) as i64);
    assert_eq!(model.query(-1), latest);
    assert_eq!(model.query(-100), latest);
    assert_eq!(model.query(model.history().len() as i64), latest);
    assert_eq!(model.query(i64::MAX), latest);
}

#[test]
fn joining_a_new_group_only_moves_shards_to_it() {
    let mut model = ConfigModel::new(0);
    model.apply(join_op(&[(1, "a"), (2, "b"), (3, "c")]));

    for gid in 4..=12 {
        let before = model.latest();
        model.apply(join_op(&[(gid, "new")]));
        let after = model.latest();

        for shard in 0..N_SHARDS {
            if before.shards[shard] != after.shards[shard] {
                assert_eq!(after.shards[shard], gid);
            }
        }
        assert!(after.is_balanced());
    }
}

#[test]
fn dangling_owner_is_reclaimed_on_next_rebalance() {
    let mut model = ConfigModel::new(0);
    model.apply(join_op(&[(1, "a"), (2, "b")]));
    model.apply(Op::Move { shard: 0, gid: 77 });
    assert_eq!(model.latest().shards[0], 77);

    model.apply(Op::Leave { gids: vec![77] });
    let config = model.latest();
    assert!(config.is_balanced());
    assert!(config.shards.iter().all(|gid| *gid == 1 || *gid == 2));
}

#[test]
fn encoded_commands_follow_the_same_path() {
    let mut model = ConfigModel::new(0);

    assert!(model.apply_encoded(br#"{"op":"join","servers":{"100":["s1"]}}"#).is_ok());
    assert!(model.apply_encoded(br#"{"op":"move","shard":2,"gid":0}"#).is_ok());

    let reply = model.apply_encoded(br#"{"op":"query","num":1}"#);
    assert_eq!(reply.config.shards, [100; N_SHARDS]);

    let reply = model.apply_encoded(br#"{"op":"split","shard":2}"#);
    assert_eq!(reply.status, Status::InvalidOperation);
    assert_eq!(reply.config, Config::default());
    assert_eq!(model.history().len(), 3);

    // Positional payloads carry no tag and are never applied
    let reply = model.apply_encoded(br#"["move",null,null,3,101,null]"#);
    assert_eq!(reply.status, Status::InvalidOperation);
    let reply = model.apply_encoded(br#"{"op":5,"shard":3,"gid":101}"#);
    assert_eq!(reply.status, Status::InvalidOperation);
    assert_eq!(model.history().len(), 3);
    assert_eq!(model.latest().shards[3], 100);
}
