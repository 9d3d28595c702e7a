//! Dispatch semantics across the public surface: hierarchy resolution,
//! exit/enter chains, history, failure capture, and both dispatcher
//! variants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use treeline::builder::{MachineBuilder, StateConfig};
use treeline::core::{EventArgs, EventId, HistoryKind, StateId, Transition};
use treeline::dispatch::PassiveMachine;
use treeline::id_enum;

id_enum! {
    #[allow(non_camel_case_types)]
    enum St {
        S1,
        S1_1,
        S1_2,
        S2,
        Top,
        Hold,
        HoldA,
        HoldA1,
        HoldA2,
        HoldB,
        Away,
    }
}

id_enum! {
    enum Ev {
        S1ToS2,
        S2ToS1,
        E1,
        Leave,
        Return,
        Shuffle,
        Loop,
        Nudge,
    }
}

type Trace = Arc<Mutex<Vec<String>>>;

fn attach_recorder<S: StateId, E: EventId, A: EventArgs>(
    machine: &PassiveMachine<S, E, A>,
) -> Trace {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));

    {
        let trace = Arc::clone(&trace);
        machine.subscribe_begin_dispatch(move |record| {
            trace.lock().unwrap().push(format!(
                "begin:{}@{}",
                record.event.name(),
                record.source.name()
            ));
            Ok(())
        });
    }
    {
        let trace = Arc::clone(&trace);
        machine.subscribe_transition_declined(move |record| {
            trace.lock().unwrap().push(format!(
                "declined:{}@{}",
                record.event.name(),
                record.source.name()
            ));
            Ok(())
        });
    }
    {
        let trace = Arc::clone(&trace);
        machine.subscribe_transition_completed(move |record| {
            trace.lock().unwrap().push(format!(
                "completed:{} {}->{}",
                record.event.name(),
                record.source.name(),
                record.target.name()
            ));
            Ok(())
        });
    }
    {
        let trace = Arc::clone(&trace);
        machine.subscribe_exception_thrown(move |record| {
            trace.lock().unwrap().push(format!(
                "exception:{} initialized={}",
                record.fault.message(),
                record.machine_initialized
            ));
            Ok(())
        });
    }

    trace
}

fn taken(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().clone()
}

#[test]
fn simple_transition_completes() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    builder
        .transition(s1, Ev::S1ToS2, Transition::to(s2))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::S1ToS2, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S2));
    assert_eq!(
        taken(&trace),
        vec!["begin:S1ToS2@S1", "completed:S1ToS2 S1->S2"]
    );
}

#[test]
fn unhandled_event_is_declined() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    builder
        .transition(s1, Ev::S1ToS2, Transition::to(s2))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::S2ToS1, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S1));
    assert_eq!(
        taken(&trace),
        vec!["begin:S2ToS1@S1", "declined:S2ToS1@S1"]
    );
}

#[test]
fn entry_failure_during_initialize_is_flagged() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder
        .state(StateConfig::new(St::S1).try_on_entry(|| Err("entry failed".into())))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S1));
    assert_eq!(
        taken(&trace),
        vec!["exception:entry failed initialized=false"]
    );
}

#[test]
fn exit_failure_does_not_prevent_completion() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder
        .state(StateConfig::new(St::S1).try_on_exit(|| Err("exit failed".into())))
        .unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    builder
        .transition(s1, Ev::S1ToS2, Transition::to(s2))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::S1ToS2, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S2));
    assert_eq!(
        taken(&trace),
        vec![
            "begin:S1ToS2@S1",
            "exception:exit failed initialized=true",
            "completed:S1ToS2 S1->S2",
        ]
    );
}

#[test]
fn every_action_runs_even_when_all_fail() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let transition = {
        let first = Arc::clone(&calls);
        let second = Arc::clone(&calls);
        Transition::to(s2)
            .try_action(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
                Err("first action failed".into())
            })
            .try_action(move |_| {
                second.fetch_add(1, Ordering::SeqCst);
                Err("second action failed".into())
            })
    };
    builder.transition(s1, Ev::S1ToS2, transition).unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::S1ToS2, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(machine.current_state_id(), Some(St::S2));
    assert_eq!(
        taken(&trace),
        vec![
            "begin:S1ToS2@S1",
            "exception:first action failed initialized=true",
            "exception:second action failed initialized=true",
            "completed:S1ToS2 S1->S2",
        ]
    );
}

/// S1 { S1_1, S1_2 } with the superstate handling E1 once the substate
/// guards run dry.
fn superstate_machine() -> (PassiveMachine<St, Ev>, Trace) {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s1_1 = builder
        .substate_of(s1, StateConfig::new(St::S1_1))
        .unwrap();
    let s1_2 = builder
        .substate_of(s1, StateConfig::new(St::S1_2))
        .unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    builder.initial(s1, s1_1).unwrap();

    builder
        .transition(s1_1, Ev::E1, Transition::to(s1_2))
        .unwrap();
    builder
        .transition(s1_2, Ev::E1, Transition::to(s1_1).when(|_| false))
        .unwrap();
    builder.transition(s1, Ev::E1, Transition::to(s2)).unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();
    (machine, trace)
}

#[test]
fn superstate_handles_event_when_substate_guard_fails() {
    let (machine, _trace) = superstate_machine();

    machine.send(Ev::E1, ()).unwrap();
    machine.execute().unwrap();
    assert_eq!(machine.current_state_id(), Some(St::S1_2));

    machine.send(Ev::E1, ()).unwrap();
    machine.execute().unwrap();
    assert_eq!(machine.current_state_id(), Some(St::S2));
}

#[test]
fn guard_failure_counts_as_false_and_is_reported() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();

    builder
        .transition(
            s1,
            Ev::E1,
            Transition::to(s2).try_when(|_| Err("guard failed".into())),
        )
        .unwrap();
    builder.transition(s1, Ev::E1, Transition::to(s2)).unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::E1, ()).unwrap();
    machine.execute().unwrap();

    // The raising guard was skipped; the next transition in line won.
    assert_eq!(machine.current_state_id(), Some(St::S2));
    assert_eq!(
        taken(&trace),
        vec![
            "begin:E1@S1",
            "exception:guard failed initialized=true",
            "completed:E1 S1->S2",
        ]
    );
}

#[test]
fn all_guards_failing_still_declines_once() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();

    builder
        .transition(
            s1,
            Ev::E1,
            Transition::to(s2).try_when(|_| Err("guard one failed".into())),
        )
        .unwrap();
    builder
        .transition(
            s1,
            Ev::E1,
            Transition::to(s2).try_when(|_| Err("guard two failed".into())),
        )
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();

    machine.send(Ev::E1, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S1));
    assert_eq!(
        taken(&trace),
        vec![
            "begin:E1@S1",
            "exception:guard one failed initialized=true",
            "exception:guard two failed initialized=true",
            "declined:E1@S1",
        ]
    );
}

#[test]
fn internal_transition_runs_actions_without_hooks() {
    let entries = Arc::new(AtomicUsize::new(0));
    let exits = Arc::new(AtomicUsize::new(0));
    let actions = Arc::new(AtomicUsize::new(0));

    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = {
        let entries = Arc::clone(&entries);
        let exits = Arc::clone(&exits);
        builder
            .state(
                StateConfig::new(St::S1)
                    .on_entry(move || {
                        entries.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_exit(move || {
                        exits.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap()
    };
    {
        let actions = Arc::clone(&actions);
        builder
            .transition(
                s1,
                Ev::Nudge,
                Transition::internal().action(move |_| {
                    actions.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();
    assert_eq!(entries.load(Ordering::SeqCst), 1);

    machine.send(Ev::Nudge, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(actions.load(Ordering::SeqCst), 1);
    assert_eq!(entries.load(Ordering::SeqCst), 1);
    assert_eq!(exits.load(Ordering::SeqCst), 0);
    assert_eq!(machine.current_state_id(), Some(St::S1));
    assert_eq!(taken(&trace), vec!["begin:Nudge@S1", "completed:Nudge S1->S1"]);
}

#[test]
fn external_self_transition_exits_and_reenters() {
    let entries = Arc::new(AtomicUsize::new(0));
    let exits = Arc::new(AtomicUsize::new(0));

    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = {
        let entries = Arc::clone(&entries);
        let exits = Arc::clone(&exits);
        builder
            .state(
                StateConfig::new(St::S1)
                    .on_entry(move || {
                        entries.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_exit(move || {
                        exits.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap()
    };
    builder.transition(s1, Ev::Loop, Transition::to(s1)).unwrap();

    let machine = builder.build_passive().unwrap();
    machine.initialize(s1).unwrap();
    assert_eq!(entries.load(Ordering::SeqCst), 1);

    machine.send(Ev::Loop, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(exits.load(Ordering::SeqCst), 1);
    assert_eq!(entries.load(Ordering::SeqCst), 2);
    assert_eq!(machine.current_state_id(), Some(St::S1));
}

/// Top { Hold { HoldA { HoldA1, HoldA2 }, HoldB }, Away } with `Leave`
/// jumping to Away and `Return` coming back into Hold.
fn history_machine(kind: HistoryKind) -> PassiveMachine<St, Ev> {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let top = builder.state(StateConfig::new(St::Top)).unwrap();
    let hold = builder
        .substate_of(top, StateConfig::new(St::Hold).history(kind))
        .unwrap();
    let hold_a = builder
        .substate_of(hold, StateConfig::new(St::HoldA))
        .unwrap();
    let hold_a1 = builder
        .substate_of(hold_a, StateConfig::new(St::HoldA1))
        .unwrap();
    let hold_a2 = builder
        .substate_of(hold_a, StateConfig::new(St::HoldA2))
        .unwrap();
    let hold_b = builder
        .substate_of(hold, StateConfig::new(St::HoldB))
        .unwrap();
    let away = builder.substate_of(top, StateConfig::new(St::Away)).unwrap();

    builder.initial(top, hold).unwrap();
    builder.initial(hold, hold_a).unwrap();
    builder.initial(hold_a, hold_a1).unwrap();

    builder
        .transition(hold_a1, Ev::Shuffle, Transition::to(hold_a2))
        .unwrap();
    builder
        .transition(hold_a2, Ev::Shuffle, Transition::to(hold_b))
        .unwrap();
    builder
        .transition(top, Ev::Leave, Transition::to(away))
        .unwrap();
    builder
        .transition(away, Ev::Return, Transition::to(hold))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    machine.initialize(top).unwrap();
    machine
}

#[test]
fn no_history_reenters_through_initial_pointers() {
    let machine = history_machine(HistoryKind::None);

    machine.send(Ev::Shuffle, ()).unwrap();
    machine.send(Ev::Leave, ()).unwrap();
    machine.send(Ev::Return, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::HoldA1));
}

#[test]
fn shallow_history_restores_direct_child_then_drills_fresh() {
    let machine = history_machine(HistoryKind::Shallow);

    // Deep position HoldA2, then leave; shallow remembers only HoldA.
    machine.send(Ev::Shuffle, ()).unwrap();
    machine.send(Ev::Leave, ()).unwrap();
    machine.send(Ev::Return, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::HoldA1));

    // From HoldB the remembered direct child changes.
    machine.send(Ev::Shuffle, ()).unwrap();
    machine.send(Ev::Shuffle, ()).unwrap();
    machine.send(Ev::Leave, ()).unwrap();
    machine.send(Ev::Return, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::HoldB));
}

#[test]
fn deep_history_restores_the_original_leaf() {
    let machine = history_machine(HistoryKind::Deep);

    machine.send(Ev::Shuffle, ()).unwrap();
    machine.send(Ev::Leave, ()).unwrap();
    machine.send(Ev::Return, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::HoldA2));
}

#[test]
fn events_are_processed_in_send_order() {
    let (machine, trace) = superstate_machine();

    machine.send(Ev::E1, ()).unwrap();
    machine.send(Ev::E1, ()).unwrap();
    machine.send(Ev::S2ToS1, ()).unwrap();
    machine.execute().unwrap();

    let begins: Vec<String> = taken(&trace)
        .into_iter()
        .filter(|line| line.starts_with("begin:"))
        .collect();
    assert_eq!(
        begins,
        vec!["begin:E1@S1_1", "begin:E1@S1_2", "begin:S2ToS1@S2"]
    );
}

#[test]
fn reentrant_send_runs_after_the_current_dispatch() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();

    let slot: Arc<Mutex<Option<treeline::dispatch::EventSender<Ev, ()>>>> =
        Arc::new(Mutex::new(None));
    {
        let slot = Arc::clone(&slot);
        builder
            .transition(
                s1,
                Ev::S1ToS2,
                Transition::to(s2).action(move |_| {
                    if let Some(sender) = slot.lock().unwrap().as_ref() {
                        sender.send(Ev::S2ToS1, ()).unwrap();
                    }
                }),
            )
            .unwrap();
    }
    builder
        .transition(s2, Ev::S2ToS1, Transition::to(s1))
        .unwrap();

    let machine = builder.build_passive().unwrap();
    let trace = attach_recorder(&machine);
    machine.initialize(s1).unwrap();
    *slot.lock().unwrap() = Some(machine.sender());

    machine.send(Ev::S1ToS2, ()).unwrap();
    machine.execute().unwrap();

    assert_eq!(machine.current_state_id(), Some(St::S1));
    assert_eq!(
        taken(&trace),
        vec![
            "begin:S1ToS2@S1",
            "completed:S1ToS2 S1->S2",
            "begin:S2ToS1@S2",
            "completed:S2ToS1 S2->S1",
        ]
    );
}

#[test]
fn event_args_reach_guards_and_actions() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut builder = MachineBuilder::<St, Ev, u32>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    {
        let seen = Arc::clone(&seen);
        builder
            .transition(
                s1,
                Ev::S1ToS2,
                Transition::to(s2)
                    .when(|amount: &u32| *amount >= 10)
                    .action(move |amount: &u32| {
                        seen.lock().unwrap().push(*amount);
                    }),
            )
            .unwrap();
    }

    let machine = builder.build_passive().unwrap();
    machine.initialize(s1).unwrap();

    machine.send(Ev::S1ToS2, 3).unwrap();
    machine.execute().unwrap();
    assert_eq!(machine.current_state_id(), Some(St::S1));

    machine.send(Ev::S1ToS2, 12).unwrap();
    machine.execute().unwrap();
    assert_eq!(machine.current_state_id(), Some(St::S2));
    assert_eq!(*seen.lock().unwrap(), vec![12]);
}

#[test]
fn active_machine_dispatches_hierarchical_events() {
    let mut builder = MachineBuilder::<St, Ev>::new();
    let s1 = builder.state(StateConfig::new(St::S1)).unwrap();
    let s1_1 = builder
        .substate_of(s1, StateConfig::new(St::S1_1))
        .unwrap();
    let s1_2 = builder
        .substate_of(s1, StateConfig::new(St::S1_2))
        .unwrap();
    let s2 = builder.state(StateConfig::new(St::S2)).unwrap();
    builder.initial(s1, s1_1).unwrap();
    builder
        .transition(s1_1, Ev::E1, Transition::to(s1_2))
        .unwrap();
    builder.transition(s1, Ev::Leave, Transition::to(s2)).unwrap();

    let machine = builder.build_active().unwrap();
    let (tx, rx) = mpsc::channel();
    machine.subscribe_transition_completed(move |record| {
        tx.send((record.source.clone(), record.target.clone()))
            .map_err(|e| e.to_string())?;
        Ok(())
    });

    machine.initialize(s1).unwrap();
    machine.send(Ev::E1, ()).unwrap();
    machine.send(Ev::Leave, ()).unwrap();

    let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first, (St::S1_1, St::S1_2));

    let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(second, (St::S1, St::S2));

    machine.shutdown();
    assert_eq!(machine.current_state_id(), Some(St::S2));
}
