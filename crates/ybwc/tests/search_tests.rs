//! End-to-end searches of the synthetic tree.

mod common;

use std::time::Duration;

use common::{options, tree_pool, wait_until};
use ybwc::search::SearchLimits;
use ybwc::synthetic::{
    SearchResult, TreeMove, TreePosition, TreeSearch, minimax, minimax_restricted,
};
use ybwc::{Position, ThreadPool};

fn search(pool: &ThreadPool<TreeSearch>, pos: &TreePosition, depth: i32) -> SearchResult {
    pool.begin_search(pos, &SearchLimits::with_depth(depth), &[], None);
    pool.wait_for_search_finished();
    pool.engine().last_result().unwrap()
}

#[test]
fn test_parallel_matches_minimax() {
    for threads in [1, 2, 4] {
        let pool = tree_pool(&options(threads));
        for seed in 0..4 {
            let pos = TreePosition::new(seed, 6);
            let result = search(&pool, &pos, 6);

            assert_eq!(result.score, minimax(&pos, 6), "threads {threads}, seed {seed}");
            assert_eq!(result.depth, 6);
            assert!(result.best_move.is_some());
        }
    }
}

#[test]
fn test_best_move_has_best_score() {
    let pool = tree_pool(&options(4));
    let pos = TreePosition::new(99, 7);
    let result = search(&pool, &pos, 5);

    let best = result.best_move.unwrap();
    assert_eq!(-minimax(&pos.child(best), 4), result.score);

    let top = pool.context().best_root_moves(1);
    assert_eq!(top[0].mv(), best);
    assert_eq!(top[0].score, result.score);
}

#[test]
fn test_results_do_not_depend_on_late_join() {
    let pos = TreePosition::new(5, 8);
    let expected = minimax(&pos, 5);

    for late_join in [false, true] {
        let pool = tree_pool(&options(4).with_late_join(late_join));
        assert_eq!(search(&pool, &pos, 5).score, expected);
    }
}

#[test]
fn test_parallel_search_counts_all_nodes() {
    let pos = TreePosition::new(23, 6);
    let pool = tree_pool(&options(4));
    let result = search(&pool, &pos, 6);

    assert!(pool.engine().splits() > 0);
    assert!(result.nodes > 0);
    // Every node is a child of some expanded node, so there are at least as
    // many as in the minimal tree and at most as many as in the full tree.
    let full: u64 = (1..=6).map(|d| 6u64.pow(d)).sum::<u64>() * 6;
    assert!(result.nodes <= full);
    assert!(result.nodes >= 6u64.pow(3));
}

#[test]
fn test_fake_split_matches_minimax() {
    let pool = ThreadPool::new(TreeSearch::with_fake_split(), &options(1).with_min_split_depth(1))
        .unwrap();
    let pos = TreePosition::new(8, 4);

    let result = search(&pool, &pos, 6);

    assert_eq!(result.score, minimax(&pos, 6));
    assert!(pool.engine().splits() > 0);
    assert_eq!(pool.engine().split_point_searches(), pool.engine().splits());
}

#[test]
fn test_split_point_stack_exhaustion_keeps_result() {
    let pool = ThreadPool::new(TreeSearch::with_fake_split(), &options(1).with_min_split_depth(1))
        .unwrap();
    // Every node splits, so a binary tree this deep nests past the stack.
    let pos = TreePosition::new(4, 2);

    let result = search(&pool, &pos, 16);

    assert_eq!(result.score, minimax(&pos, 16));
    // Splits nested deeper than the stack are refused and searched serially.
    assert!(pool.engine().split_point_searches() < pool.engine().splits());
}

#[test]
fn test_search_moves_restriction() {
    let pool = tree_pool(&options(4));
    let pos = TreePosition::new(31, 6);
    let allowed = [TreeMove(1), TreeMove(4)];

    pool.begin_search(&pos, &SearchLimits::with_depth(5), &allowed, None);
    pool.wait_for_search_finished();

    let result = pool.engine().last_result().unwrap();
    assert_eq!(result.score, minimax_restricted(&pos, 5, &allowed));
    assert!(allowed.contains(&result.best_move.unwrap()));

    let root_moves: Vec<TreeMove> = pool.context().root_moves().iter().map(|rm| rm.mv()).collect();
    assert_eq!(root_moves.len(), 2);
    assert!(root_moves.iter().all(|mv| allowed.contains(mv)));
}

#[test]
fn test_unknown_search_moves_leave_empty_root() {
    let pool = tree_pool(&options(2));
    let pos = TreePosition::new(31, 3);

    pool.begin_search(&pos, &SearchLimits::with_depth(3), &[TreeMove(9)], None);
    pool.wait_for_search_finished();

    assert!(pool.context().root_moves().is_empty());
    let result = pool.engine().last_result().unwrap();
    assert_eq!(result.best_move, None);
    assert_eq!(result.score, pos.evaluate());
}

#[test]
fn test_wait_for_search_finished_sees_parked_main() {
    let pool = tree_pool(&options(3));
    let pos = TreePosition::new(2, 6);

    pool.begin_search(&pos, &SearchLimits::with_depth(6), &[], None);
    pool.wait_for_search_finished();

    let main = pool.main_thread().unwrap();
    assert!(main.do_sleep());
    for idx in 0..pool.size() {
        let thread = pool.thread(idx).unwrap();
        assert!(thread.do_sleep());
        assert_eq!(thread.split_points_size(), 0);
    }
}

#[test]
fn test_back_to_back_searches() {
    let pool = tree_pool(&options(4));
    for seed in 10..16 {
        let pos = TreePosition::new(seed, 5);
        pool.begin_search(&pos, &SearchLimits::with_depth(5), &[], None);
    }
    pool.wait_for_search_finished();

    let last = TreePosition::new(15, 5);
    assert_eq!(pool.engine().last_result().unwrap().score, minimax(&last, 5));
}

#[test]
fn test_infinite_search_holds_result_until_stopped() {
    let pool = tree_pool(&options(2));
    let limits = SearchLimits {
        depth: 3,
        infinite: true,
        ..SearchLimits::default()
    };

    pool.begin_search(&TreePosition::new(3, 4), &limits, &[], None);
    assert!(wait_until(|| pool.signals().stop_on_ponderhit()));

    let main = pool.main_thread().unwrap();
    assert!(!main.do_sleep());

    pool.stop();
    pool.wait_for_search_finished();
    assert!(main.do_sleep());
    assert_eq!(pool.engine().last_result().unwrap().depth, 3);
}

#[test]
fn test_ponder_hit_after_finished_search_stops() {
    let pool = tree_pool(&options(2));
    let limits = SearchLimits {
        depth: 3,
        ponder: true,
        ..SearchLimits::default()
    };

    pool.begin_search(&TreePosition::new(6, 4), &limits, &[], None);
    assert!(wait_until(|| pool.signals().stop_on_ponderhit()));

    pool.ponder_hit();
    pool.wait_for_search_finished();
    assert!(pool.signals().stop());
}

#[test]
fn test_ponder_hit_during_search_clears_ponder() {
    let pool = tree_pool(&options(2));
    let limits = SearchLimits {
        depth: 40,
        ponder: true,
        ..SearchLimits::default()
    };

    pool.begin_search(&TreePosition::new(6, 8), &limits, &[], None);
    pool.ponder_hit();

    assert!(!pool.context().limits().ponder);
    assert!(!pool.signals().stop());

    pool.stop();
    pool.wait_for_search_finished();
}

#[test]
fn test_movetime_stops_search_through_timer() {
    let pool = tree_pool(&options(2));
    let limits = SearchLimits {
        depth: 40,
        movetime: 40,
        ..SearchLimits::default()
    };

    pool.begin_search(&TreePosition::new(12, 8), &limits, &[], None);
    pool.wait_for_search_finished();

    let timer = pool.timer().unwrap();
    assert!(pool.signals().stop());
    assert!(timer.checks() > 0);
    assert_eq!(timer.interval(), 0);

    let result = pool.engine().last_result().unwrap();
    assert!(result.depth < 40);
    assert!(pool.context().elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_setup_states_are_kept() {
    let pool = tree_pool(&options(1));
    let pos = TreePosition::new(1, 3);

    pool.begin_search(&pos, &SearchLimits::with_depth(2), &[], Some(vec![1, 2, 3]));
    pool.wait_for_search_finished();

    assert_eq!(pool.context().setup_states().as_deref(), Some(&[1, 2, 3][..]));
    assert_eq!(pool.context().root_position().unwrap().nodes_searched(), 0);
}
