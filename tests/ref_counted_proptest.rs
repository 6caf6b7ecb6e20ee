use proptest::prelude::*;
use rc_shared::RefCountedPtr;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

// Each tracked value reports its id when destroyed.
struct Tracked {
    id: usize,
    dropped: Rc<RefCell<Vec<usize>>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.dropped.borrow_mut().push(self.id);
    }
}

#[derive(Clone, Debug)]
enum Op {
    Make(usize),
    Clone { from: usize, to: usize },
    Assign { from: usize, to: usize },
    Clear(usize),
}

const SLOTS: usize = 6;

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SLOTS).prop_map(Op::Make),
        (0..SLOTS, 0..SLOTS).prop_map(|(from, to)| Op::Clone { from, to }),
        (0..SLOTS, 0..SLOTS).prop_map(|(from, to)| Op::Assign { from, to }),
        (0..SLOTS).prop_map(Op::Clear),
    ]
}

// Model: slot i holds either nothing or the id of its target. A target is
// alive iff some slot still refers to it; every id is destroyed at most
// once, and exactly when its last slot lets go.
proptest! {
    #[test]
    fn prop_refcount_liveness(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let mut slots: Vec<RefCountedPtr<Tracked>> = (0..SLOTS).map(|_| RefCountedPtr::null()).collect();
        let mut model: Vec<Option<usize>> = vec![None; SLOTS];
        let mut next_id = 0usize;

        for op in ops {
            match op {
                Op::Make(i) => {
                    slots[i] = RefCountedPtr::make(Tracked { id: next_id, dropped: dropped.clone() });
                    model[i] = Some(next_id);
                    next_id += 1;
                }
                Op::Clone { from, to } => {
                    slots[to] = slots[from].clone();
                    model[to] = model[from];
                }
                Op::Assign { from, to } => {
                    let src = slots[from].clone();
                    slots[to].assign(&src);
                    model[to] = model[from];
                }
                Op::Clear(i) => {
                    slots[i].clear();
                    model[i] = None;
                }
            }

            let live: BTreeSet<usize> = model.iter().flatten().copied().collect();
            let gone: Vec<usize> = dropped.borrow().clone();
            let gone_set: BTreeSet<usize> = gone.iter().copied().collect();

            // Destroyed at most once.
            prop_assert_eq!(gone.len(), gone_set.len());
            // Everything minted is either live or destroyed, never both.
            prop_assert!(live.is_disjoint(&gone_set));
            prop_assert_eq!(live.len() + gone_set.len(), next_id);

            for (slot, expected) in slots.iter().zip(model.iter()) {
                prop_assert_eq!(slot.get().map(|t| t.id), *expected);
                let sharers = model.iter().filter(|m| m.is_some() && *m == expected).count();
                if expected.is_some() {
                    prop_assert_eq!(slot.is_unique(), sharers == 1);
                }
            }
        }

        drop(slots);
        prop_assert_eq!(dropped.borrow().len(), next_id);
    }
}
