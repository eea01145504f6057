use std::collections::{HashMap, HashSet};

use dayplan::calendar::{build_calendar, MAX_DAILY_MINUTES, WINDOW_DAYS};
use dayplan::config::RecoveryOrder;
use dayplan::drift::drift_metrics;
use dayplan::planner::Planner;
use dayplan::recovery::{
    loads_after, rebalance, validate_proposal, BuiltinProposer, MoveReason, PlanProposer,
    ProposalRequest, RecoveryEngine,
};
use dayplan::store::{MemoryTaskStore, TaskStore};
use dayplan::task::{Priority, Task, DAY_MS};

const TODAY: i64 = 1_760_572_800_000;

struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

fn task(id: &str, goal: &str, minutes: u32, due: i64) -> Task {
    Task::new(id, "u1", goal, id)
        .with_estimate(minutes)
        .with_due_date(due)
}

fn random_schedule(rng: &mut Lcg) -> Vec<Task> {
    let mut tasks = Vec::new();
    for i in 0..rng.next(25) {
        let goal = format!("g{}", rng.next(4));
        let offset = rng.next(WINDOW_DAYS as u64) as i64;
        tasks.push(task(
            &format!("s{i}"),
            &goal,
            rng.next(400) as u32,
            TODAY + offset * DAY_MS + 9 * 3_600_000,
        ));
    }
    for i in 0..rng.next(10) + 1 {
        let goal = format!("g{}", rng.next(4));
        let age = rng.next(5) as i64 + 1;
        tasks.push(task(&format!("o{i}"), &goal, rng.next(200) as u32, TODAY - age * DAY_MS));
    }
    tasks
}

fn request_for(tasks: &[Task]) -> ProposalRequest {
    RecoveryEngine::new(&BuiltinProposer).request(tasks, TODAY)
}

#[test]
fn every_overdue_task_is_placed_exactly_once() {
    let mut rng = Lcg(11);
    for case in 0..200 {
        let tasks = random_schedule(&mut rng);
        let request = request_for(&tasks);
        let moves = BuiltinProposer.propose(&request).expect("builtin never fails");

        validate_proposal(&request, &moves).expect("builtin plans are valid");
        let mut seen = HashSet::new();
        for mv in &moves {
            assert!(seen.insert(mv.task_id.clone()), "case {case}: {} moved twice", mv.task_id);
        }
        for overdue in &request.overdue_tasks {
            assert!(seen.contains(&overdue.id), "case {case}: {} left behind", overdue.id);
        }
    }
}

#[test]
fn only_swaps_and_full_windows_exceed_the_ceiling() {
    let mut rng = Lcg(23);
    for case in 0..200 {
        let tasks = random_schedule(&mut rng);
        let request = request_for(&tasks);
        let moves = BuiltinProposer.propose(&request).expect("plan");
        let loads = loads_after(&request, &moves);

        let initial: Vec<u64> = request.calendar.iter().map(|d| d.load_minutes).collect();
        let swapped = moves.iter().any(|m| m.reason == Some(MoveReason::SwapIn));
        let fallback_days: HashSet<usize> = moves
            .iter()
            .filter(|m| m.fallback)
            .map(|m| m.day_offset)
            .collect();

        for (day, load) in loads.iter().enumerate() {
            if *load <= MAX_DAILY_MINUTES || *load <= initial[day] {
                continue;
            }
            let authorized = (day == 0 && swapped) || fallback_days.contains(&day);
            assert!(authorized, "case {case}: day {day} at {load} minutes without authorization");
        }

        for mv in moves.iter().filter(|m| m.reason == Some(MoveReason::Displaced) && !m.fallback) {
            assert!(mv.day_offset >= 1, "case {case}: displaced task stayed on today");
        }
    }
}

#[test]
fn displaced_task_lands_on_a_day_with_room() {
    let tasks = vec![
        task("big", "thesis", 700, TODAY + 10),
        task("next", "other", 690, TODAY + DAY_MS),
        task("late", "thesis", 50, TODAY - DAY_MS),
    ];
    let request = request_for(&tasks);
    let result = rebalance(&request.overdue_tasks, &request.calendar, MAX_DAILY_MINUTES);

    let displaced = result
        .moves
        .iter()
        .find(|m| m.task_id == "big")
        .expect("big displaced");
    assert_eq!(displaced.day_offset, 2);
    assert!(!displaced.fallback);
    assert!(result.calendar[2].load_minutes <= MAX_DAILY_MINUTES);
    assert_eq!(result.calendar[0].load_minutes, 50);
}

#[test]
fn full_window_falls_back_to_least_loaded_day() {
    let mut tasks = vec![task("today", "a", 720, TODAY)];
    for day in 1..WINDOW_DAYS as i64 {
        let load = if day == 5 { 650 } else { 700 };
        tasks.push(task(&format!("d{day}"), "a", load, TODAY + day * DAY_MS));
    }
    tasks.push(task("late", "b", 100, TODAY - DAY_MS));

    let outcome = RecoveryEngine::new(&BuiltinProposer).plan(&tasks, TODAY);
    let plan = outcome.plan.expect("plan");
    assert_eq!(plan.moves.len(), 1);
    assert_eq!(plan.moves[0].day_offset, 5);
    assert!(plan.moves[0].fallback);
    assert_eq!(plan.day_loads[5], 750);
}

#[test]
fn later_tasks_see_earlier_placements() {
    let tasks = vec![
        task("a", "g", 500, TODAY - DAY_MS),
        task("b", "g", 500, TODAY - DAY_MS),
        task("c", "g", 500, TODAY - DAY_MS),
    ];
    let request = RecoveryEngine::new(&BuiltinProposer)
        .with_order(RecoveryOrder::Input)
        .request(&tasks, TODAY);
    let moves = BuiltinProposer.propose(&request).expect("plan");
    let days: HashMap<&str, usize> = moves
        .iter()
        .map(|m| (m.task_id.as_str(), m.day_offset))
        .collect();
    assert_eq!(days["a"], 0);
    assert_eq!(days["b"], 1);
    assert_eq!(days["c"], 2);
}

#[test]
fn priority_order_decides_who_gets_today() {
    let tasks = vec![
        task("filler", "other", 600, TODAY),
        task("low", "g", 100, TODAY - DAY_MS).with_priority(Priority::Low),
        task("high", "g", 100, TODAY - DAY_MS).with_priority(Priority::High),
    ];

    let by_priority = RecoveryEngine::new(&BuiltinProposer).plan(&tasks, TODAY);
    let plan = by_priority.plan.expect("plan");
    assert_eq!(plan.moves[0].task_id, "high");
    assert_eq!(plan.moves[0].day_offset, 0);

    let by_input = RecoveryEngine::new(&BuiltinProposer)
        .with_order(RecoveryOrder::Input)
        .plan(&tasks, TODAY);
    let plan = by_input.plan.expect("plan");
    assert_eq!(plan.moves[0].task_id, "low");
    assert_eq!(plan.moves[0].day_offset, 0);
}

#[test]
fn calendar_and_drift_agree_on_overdue_boundary() {
    let tasks = vec![
        task("yesterday", "g", 30, TODAY - 1),
        task("midnight", "g", 30, TODAY),
    ];
    let metrics = drift_metrics(&tasks, TODAY);
    assert_eq!(metrics.overdue_count, 1);
    let calendar = build_calendar(&tasks, TODAY);
    assert_eq!(calendar[0].tasks.len(), 1);
    assert_eq!(calendar[0].tasks[0].task_id, "midnight");
}

#[test]
fn applied_recovery_clears_drift() {
    let mut rng = Lcg(5);
    let tasks = random_schedule(&mut rng);
    let store = MemoryTaskStore::with_tasks(tasks);
    let planner = Planner::new(&store);

    let outcome = planner
        .recover_schedule("u1", TODAY, false, &BuiltinProposer)
        .expect("recover");
    assert!(outcome.success);

    let remaining = drift_metrics(&store.list_incomplete_for_user("u1").expect("list"), TODAY);
    assert!(!remaining.has_drift);
}
