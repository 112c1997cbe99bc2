//! # Scheduling Strategies
//!
//! The pluggable selection algorithms behind the dispatcher. Each tick the
//! scheduler hands the full process table and the id of the just-preempted
//! process to the active strategy, which returns the id of the process to
//! run next. Strategies only ever select `Ready` slots (or fall back to
//! the idle process), never an `Unused` one.
//!
//! The selector is swapped at runtime; strategy-private bookkeeping
//! (`StrategyState`) is reset on every swap so a new strategy starts from
//! a clean slate. A swap takes effect at the next tick's selection.

use crate::config::MAX_PROCESSES;
use crate::process::{Process, ProcessId, ProcessState, IDLE_PROCESS};

/// Selector tag naming the active scheduling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Cyclic walk over the table, one tick per ready process.
    Even,
    /// Uniformly random pick among the ready processes.
    Random,
    /// Like `Even`, but the chosen process keeps the CPU for a time slice
    /// derived from its priority.
    RoundRobin,
    /// Ready processes age by their priority each tick; the oldest wins.
    InactiveAging,
    /// The current process keeps the CPU for as long as it stays ready.
    RunToCompletion,
}

/// Private bookkeeping of the currently active strategy.
pub struct StrategyState {
    /// Remaining ticks of the running process's slice (`RoundRobin`).
    time_slice: u8,
    /// Per-slot age counters (`InactiveAging`).
    ages: [u8; MAX_PROCESSES],
    /// xorshift state (`Random`). Never zero.
    rng: u16,
}

/// xorshift seed; any non-zero value works, this one is traditional.
const RNG_SEED: u16 = 0xACE1;

impl StrategyState {
    pub const fn new() -> Self {
        Self {
            time_slice: 0,
            ages: [0; MAX_PROCESSES],
            rng: RNG_SEED,
        }
    }

    /// Forget everything strategy-specific. Called when the active
    /// strategy is swapped.
    pub fn reset(&mut self) {
        self.time_slice = 0;
        self.ages = [0; MAX_PROCESSES];
        self.rng = RNG_SEED;
    }

    fn next_random(&mut self) -> u16 {
        // 16-bit xorshift; period 2^16 - 1, never yields 0.
        let mut x = self.rng;
        x ^= x << 7;
        x ^= x >> 9;
        x ^= x << 8;
        self.rng = x;
        x
    }
}

/// Run the selection algorithm named by `strategy`.
pub fn select(
    strategy: SchedulingStrategy,
    state: &mut StrategyState,
    table: &[Process; MAX_PROCESSES],
    current: ProcessId,
) -> ProcessId {
    match strategy {
        SchedulingStrategy::Even => select_even(table, current),
        SchedulingStrategy::Random => select_random(state, table),
        SchedulingStrategy::RoundRobin => select_round_robin(state, table, current),
        SchedulingStrategy::InactiveAging => select_inactive_aging(state, table),
        SchedulingStrategy::RunToCompletion => select_run_to_completion(table, current),
    }
}

#[inline]
fn is_ready(table: &[Process; MAX_PROCESSES], pid: ProcessId) -> bool {
    table[pid].state == ProcessState::Ready
}

/// Cyclic scan starting after `current`, skipping the idle slot. Idle runs
/// only when no other process is ready.
fn select_even(table: &[Process; MAX_PROCESSES], current: ProcessId) -> ProcessId {
    for offset in 1..=MAX_PROCESSES {
        let pid = (current + offset) % MAX_PROCESSES;
        if pid != IDLE_PROCESS && is_ready(table, pid) {
            return pid;
        }
    }
    IDLE_PROCESS
}

/// Pick uniformly among the ready non-idle processes.
fn select_random(state: &mut StrategyState, table: &[Process; MAX_PROCESSES]) -> ProcessId {
    let ready = (1..MAX_PROCESSES).filter(|&pid| is_ready(table, pid)).count();
    if ready == 0 {
        return IDLE_PROCESS;
    }

    let mut nth = state.next_random() as usize % ready;
    for pid in 1..MAX_PROCESSES {
        if is_ready(table, pid) {
            if nth == 0 {
                return pid;
            }
            nth -= 1;
        }
    }
    IDLE_PROCESS
}

/// `Even` plus time slices: the chosen process keeps the CPU for as many
/// ticks as its priority (at least one) before the walk advances.
fn select_round_robin(
    state: &mut StrategyState,
    table: &[Process; MAX_PROCESSES],
    current: ProcessId,
) -> ProcessId {
    if current != IDLE_PROCESS && is_ready(table, current) && state.time_slice > 1 {
        state.time_slice -= 1;
        return current;
    }

    let next = select_even(table, current);
    state.time_slice = table[next].priority.max(1);
    next
}

/// Ready processes age by their priority each tick; the oldest runs next.
/// Ties go to the higher priority, then to the lower process id. The
/// winner's age restarts at its own priority so it re-queues behind
/// everyone it just overtook.
fn select_inactive_aging(
    state: &mut StrategyState,
    table: &[Process; MAX_PROCESSES],
) -> ProcessId {
    let mut best: Option<ProcessId> = None;
    for pid in 1..MAX_PROCESSES {
        if !is_ready(table, pid) {
            // A freed slot must not inherit age from a previous tenant.
            if table[pid].state == ProcessState::Unused {
                state.ages[pid] = 0;
            }
            continue;
        }
        state.ages[pid] = state.ages[pid].saturating_add(table[pid].priority);

        best = match best {
            None => Some(pid),
            Some(b) => {
                let (age, prio) = (state.ages[pid], table[pid].priority);
                let (best_age, best_prio) = (state.ages[b], table[b].priority);
                if age > best_age || (age == best_age && prio > best_prio) {
                    Some(pid)
                } else {
                    Some(b)
                }
            }
        };
    }

    match best {
        Some(pid) => {
            state.ages[pid] = table[pid].priority;
            pid
        }
        None => IDLE_PROCESS,
    }
}

/// Keep the current process until it is no longer ready, then fall back to
/// the cyclic walk.
fn select_run_to_completion(table: &[Process; MAX_PROCESSES], current: ProcessId) -> ProcessId {
    if current != IDLE_PROCESS && is_ready(table, current) {
        return current;
    }
    select_even(table, current)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_ready(pids: &[ProcessId]) -> [Process; MAX_PROCESSES] {
        let mut table = [Process::EMPTY; MAX_PROCESSES];
        table[IDLE_PROCESS].state = ProcessState::Ready;
        table[IDLE_PROCESS].priority = 0;
        for &pid in pids {
            table[pid].state = ProcessState::Ready;
            table[pid].priority = 1;
        }
        table
    }

    #[test]
    fn even_cycles_through_ready_processes() {
        let table = table_with_ready(&[1, 3, 5]);
        let mut current = IDLE_PROCESS;
        let mut order = [0usize; 6];
        for slot in order.iter_mut() {
            current = select_even(&table, current);
            *slot = current;
        }
        assert_eq!(order, [1, 3, 5, 1, 3, 5]);
    }

    #[test]
    fn even_falls_back_to_idle() {
        let table = table_with_ready(&[]);
        assert_eq!(select_even(&table, 4), IDLE_PROCESS);
    }

    #[test]
    fn even_skips_unused_and_blocked() {
        let mut table = table_with_ready(&[2]);
        table[1].state = ProcessState::Blocked;
        assert_eq!(select_even(&table, IDLE_PROCESS), 2);
    }

    #[test]
    fn random_only_returns_ready_processes() {
        let table = table_with_ready(&[2, 6]);
        let mut state = StrategyState::new();
        for _ in 0..64 {
            let pid = select_random(&mut state, &table);
            assert!(pid == 2 || pid == 6, "picked {pid}");
        }
    }

    #[test]
    fn random_idles_without_ready_processes() {
        let table = table_with_ready(&[]);
        let mut state = StrategyState::new();
        assert_eq!(select_random(&mut state, &table), IDLE_PROCESS);
    }

    #[test]
    fn round_robin_honors_the_priority_slice() {
        let mut table = table_with_ready(&[1, 2]);
        table[1].priority = 3;
        table[2].priority = 3;
        let mut state = StrategyState::new();

        // Fresh state: first pick advances to process 1 with a 3-tick slice.
        assert_eq!(select_round_robin(&mut state, &table, IDLE_PROCESS), 1);
        assert_eq!(select_round_robin(&mut state, &table, 1), 1);
        assert_eq!(select_round_robin(&mut state, &table, 1), 1);
        // Slice exhausted: the walk moves on.
        assert_eq!(select_round_robin(&mut state, &table, 1), 2);
    }

    #[test]
    fn round_robin_abandons_a_non_ready_process() {
        let mut table = table_with_ready(&[1, 2]);
        table[1].priority = 5;
        let mut state = StrategyState::new();

        assert_eq!(select_round_robin(&mut state, &table, IDLE_PROCESS), 1);
        table[1].state = ProcessState::Unused;
        assert_eq!(select_round_robin(&mut state, &table, 1), 2);
    }

    #[test]
    fn inactive_aging_lets_low_priority_processes_through() {
        let mut table = table_with_ready(&[1, 2]);
        table[1].priority = 4;
        table[2].priority = 1;
        let mut state = StrategyState::new();

        // Process 1 ages faster and wins first...
        assert_eq!(select_inactive_aging(&mut state, &table), 1);
        // ...but its age restarts while process 2 keeps accumulating, so
        // within a few ticks the low-priority process gets a turn.
        let mut saw_two = false;
        for _ in 0..8 {
            if select_inactive_aging(&mut state, &table) == 2 {
                saw_two = true;
                break;
            }
        }
        assert!(saw_two);
    }

    #[test]
    fn inactive_aging_breaks_age_ties_by_priority() {
        let mut table = table_with_ready(&[1, 2]);
        table[1].priority = 2;
        table[2].priority = 2;
        let mut state = StrategyState::new();
        // Equal ages and priorities: the lower pid wins.
        assert_eq!(select_inactive_aging(&mut state, &table), 1);
    }

    #[test]
    fn run_to_completion_sticks_with_the_current_process() {
        let table = table_with_ready(&[1, 2]);
        assert_eq!(select_run_to_completion(&table, 1), 1);
        assert_eq!(select_run_to_completion(&table, 1), 1);
    }

    #[test]
    fn run_to_completion_moves_on_when_current_is_gone() {
        let mut table = table_with_ready(&[1, 2]);
        table[1].state = ProcessState::Unused;
        assert_eq!(select_run_to_completion(&table, 1), 2);
    }

    #[test]
    fn reset_clears_slices_ages_and_rng() {
        let mut table = table_with_ready(&[1]);
        table[1].priority = 7;
        let mut state = StrategyState::new();
        select_round_robin(&mut state, &table, IDLE_PROCESS);
        select_inactive_aging(&mut state, &table);
        select_random(&mut state, &table);
        state.reset();
        assert_eq!(state.time_slice, 0);
        assert_eq!(state.ages, [0; MAX_PROCESSES]);
        assert_eq!(state.rng, RNG_SEED);
    }
}
