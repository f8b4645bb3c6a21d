//! Optimistic writes awaiting store confirmation
//!
//! Each write is kept as an overlay on top of the base rows rather than being
//! folded into them. Confirming or rolling back a write just removes its entry;
//! the next published view is rebuilt from base + remaining overlays, so a
//! rolled-back write leaves nothing behind.

use shared::models::{Member, MemberUpdate, Payment, PaymentUpdate, Plan, PlanUpdate};

/// Rows addressable by id
pub(crate) trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Member {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Payment {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Plan {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Replace the row with the same id, or insert at the front (newest first)
pub(crate) fn upsert_front<T: Keyed>(rows: &mut Vec<T>, row: T) {
    match rows.iter().position(|r| r.key() == row.key()) {
        Some(index) => rows[index] = row,
        None => rows.insert(0, row),
    }
}

/// Replace the row with the same id, or insert keeping plans ordered by duration
pub(crate) fn upsert_plan(plans: &mut Vec<Plan>, plan: Plan) {
    plans.retain(|p| p.id != plan.id);
    let index = plans.partition_point(|p| p.duration <= plan.duration);
    plans.insert(index, plan);
}

pub(crate) fn remove_by_id<T: Keyed>(rows: &mut Vec<T>, id: &str) -> Option<T> {
    let index = rows.iter().position(|r| r.key() == id)?;
    Some(rows.remove(index))
}

fn patch_by_id<T: Keyed>(rows: &mut [T], id: &str, patch: impl FnOnce(&mut T)) {
    if let Some(row) = rows.iter_mut().find(|r| r.key() == id) {
        patch(row);
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Overlay {
    InsertMember(Member),
    UpdateMember { id: String, patch: MemberUpdate },
    DeleteMember(String),
    InsertPayment(Payment),
    UpdatePayment { id: String, patch: PaymentUpdate },
    DeletePayment(String),
    InsertPlan(Plan),
    UpdatePlan { id: String, patch: PlanUpdate },
    DeletePlan(String),
}

#[derive(Debug, Clone)]
struct PendingWrite {
    ticket: u64,
    overlay: Overlay,
}

/// Pending optimistic writes in submission order
#[derive(Debug, Default)]
pub(crate) struct PendingWrites {
    next_ticket: u64,
    writes: Vec<PendingWrite>,
}

impl PendingWrites {
    /// Register a write; the returned ticket settles it later
    pub fn push(&mut self, overlay: Overlay) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.writes.push(PendingWrite { ticket, overlay });
        ticket
    }

    /// Drop a write once the store has answered (either way)
    pub fn settle(&mut self, ticket: u64) -> bool {
        let before = self.writes.len();
        self.writes.retain(|w| w.ticket != ticket);
        self.writes.len() != before
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Apply every pending write, oldest first
    pub fn overlay(&self, members: &mut Vec<Member>, payments: &mut Vec<Payment>, plans: &mut Vec<Plan>) {
        for write in &self.writes {
            match &write.overlay {
                Overlay::InsertMember(member) => upsert_front(members, member.clone()),
                Overlay::UpdateMember { id, patch } => patch_by_id(members, id, |m| patch.apply_to(m)),
                Overlay::DeleteMember(id) => {
                    remove_by_id(members, id);
                }
                Overlay::InsertPayment(payment) => upsert_front(payments, payment.clone()),
                Overlay::UpdatePayment { id, patch } => patch_by_id(payments, id, |p| patch.apply_to(p)),
                Overlay::DeletePayment(id) => {
                    remove_by_id(payments, id);
                }
                Overlay::InsertPlan(plan) => upsert_plan(plans, plan.clone()),
                Overlay::UpdatePlan { id, patch } => {
                    if let Some(mut plan) = remove_by_id(plans, id) {
                        patch.apply_to(&mut plan);
                        upsert_plan(plans, plan);
                    }
                }
                Overlay::DeletePlan(id) => {
                    remove_by_id(plans, id);
                }
            }
        }
    }
}
