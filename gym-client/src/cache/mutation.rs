//! Optimistic mutations
//!
//! 每次写入的流程：
//! 1. 校验输入（失败则不发布、不请求）
//! 2. 发布乐观视图
//! 3. 远端写入
//! 4. 成功：合并确认行，写活动日志，发送成功提示
//! 5. 失败：撤销乐观写入，重新读取快照，发送错误提示

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::lifecycle::{derive_status, expiry_for};
use shared::message::{ChangeTable, Notice};
use shared::models::{
    ActivityCreate, ActivityEntry, ActivityType, Member, MemberCreate, MemberUpdate, Payment,
    PaymentCreate, PaymentUpdate, Plan, PlanCreate, PlanUpdate, ProfileUpdate,
};
use shared::{CrudAction, GymIntent, util, validation};

use super::CacheInner;
use super::pending::{Overlay, remove_by_id, upsert_front, upsert_plan};
use super::snapshot::BaseData;
use crate::auth::AccountSession;
use crate::error::{CacheError, CacheResult};
use crate::store::{Filter, decode, owned_row};

/// What a confirmed mutation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Store-assigned id of the new row
    Created { id: String },
    Updated { id: String },
    /// `existed` is false when the row was already gone
    Deleted { id: String, existed: bool },
    ProfileUpdated,
}

impl MutationOutcome {
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::Created { id } | Self::Updated { id } | Self::Deleted { id, .. } => Some(id),
            Self::ProfileUpdated => None,
        }
    }
}

const MEMBERS: ChangeTable = ChangeTable::Members;
const PAYMENTS: ChangeTable = ChangeTable::Payments;
const PLANS: ChangeTable = ChangeTable::Plans;

/// Insert body: the optimistic entity minus store-generated columns
fn insert_row<T: Serialize>(entity: &T) -> CacheResult<Value> {
    let mut row = serde_json::to_value(entity).map_err(|e| CacheError::Internal(e.to_string()))?;
    if let Some(map) = row.as_object_mut() {
        for generated in ["id", "created_at", "updated_at"] {
            map.remove(generated);
        }
    }
    Ok(row)
}

/// Update body: present fields plus `updated_at`
fn patch_body<T: Serialize>(patch: &T, now: &str) -> CacheResult<Value> {
    let mut body = serde_json::to_value(patch).map_err(|e| CacheError::Internal(e.to_string()))?;
    match body.as_object_mut() {
        Some(map) => {
            map.retain(|_, v| !v.is_null());
            map.insert("updated_at".into(), Value::String(now.to_string()));
            Ok(body)
        }
        None => Err(CacheError::Internal("patch must serialize to an object".into())),
    }
}

/// First returned row, or `NotFound` when the filter matched nothing
fn first_row<T: DeserializeOwned>(rows: Vec<Value>, entity: &'static str, id: &str) -> CacheResult<T> {
    let row = rows.into_iter().next().ok_or_else(|| CacheError::NotFound {
        entity,
        id: id.to_string(),
    })?;
    decode(row).map_err(CacheError::remote_write)
}

fn owned_filter(id: &str, account: &AccountSession) -> Filter {
    Filter::by_id(id).eq("user_id", account.account_id.as_str())
}

impl CacheInner {
    pub(crate) async fn apply_mutation(self: &Arc<Self>, intent: GymIntent) -> CacheResult<MutationOutcome> {
        let label = intent.label();
        tracing::debug!(intent = %label, "Applying mutation");

        let result = match intent {
            GymIntent::Member(action) => match action {
                CrudAction::Create(data) => self.create_member(data).await,
                CrudAction::Update { id, data } => self.update_member(id, data).await,
                CrudAction::Delete { id } => self.delete_member(id).await,
            },
            GymIntent::Payment(action) => match action {
                CrudAction::Create(data) => self.create_payment(data).await,
                CrudAction::Update { id, data } => self.update_payment(id, data).await,
                CrudAction::Delete { id } => self.delete_payment(id).await,
            },
            GymIntent::Plan(action) => match action {
                CrudAction::Create(data) => self.create_plan(data).await,
                CrudAction::Update { id, data } => self.update_plan(id, data).await,
                CrudAction::Delete { id } => self.delete_plan(id).await,
            },
            GymIntent::Profile(update) => self.update_profile(update).await,
        };

        match &result {
            Ok(outcome) => tracing::info!(intent = %label, entity_id = ?outcome.entity_id(), "Mutation confirmed"),
            Err(err) if err.is_local() => {
                tracing::debug!(intent = %label, error = %err, "Mutation rejected");
                self.notify_error(err);
            }
            Err(err) => {
                tracing::error!(intent = %label, code = ?err.code(), error = %err, "Mutation failed");
                self.notify_error(err);
            }
        }
        result
    }

    // ========== Shared steps ==========

    /// Publish an optimistic write
    fn stage(&self, epoch: u64, overlay: Overlay) -> CacheResult<u64> {
        let mut core = self.core.lock();
        if !core.is_current(epoch) {
            return Err(CacheError::AuthRequired);
        }
        let ticket = core.pending.push(overlay);
        self.publish(&core);
        Ok(ticket)
    }

    /// Settle an accepted write and fold the confirmed row into the base data
    fn confirm(&self, epoch: u64, ticket: u64, merge: impl FnOnce(&mut BaseData)) {
        let mut core = self.core.lock();
        core.pending.settle(ticket);
        if !core.is_current(epoch) {
            return;
        }
        if let Some(base) = core.base.as_mut() {
            merge(base);
            // 此前开始的读取不含本次写入
            core.authority = self.next_seq();
            core.write_authority = core.authority;
        }
        self.publish(&core);
    }

    /// Undo a rejected write, then discard local state by refetching
    async fn roll_back(self: &Arc<Self>, epoch: u64, ticket: u64, err: CacheError) -> CacheError {
        let marker = {
            let mut core = self.core.lock();
            core.pending.settle(ticket);
            if core.is_current(epoch) {
                self.publish(&core);
            }
            self.current_seq()
        };

        if self.is_current(epoch)
            && let Err(refetch) = self.fetch_after(marker).await
        {
            tracing::warn!(error = %refetch, "Refetch after failed write did not complete");
        }
        err
    }

    /// Append an activity log entry; failures are logged, never surfaced
    async fn record(&self, epoch: u64, account: &AccountSession, kind: ActivityType, description: String) {
        let row = match owned_row(&ActivityCreate::new(kind, description), "user_id", &account.account_id) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(activity = %kind, error = %e, "Failed to encode activity entry");
                return;
            }
        };

        match self
            .store
            .insert(ChangeTable::ActivityLog.as_str(), row)
            .await
            .and_then(decode::<ActivityEntry>)
        {
            Ok(entry) => {
                let mut core = self.core.lock();
                if core.is_current(epoch)
                    && let Some(base) = core.base.as_mut()
                {
                    base.activity_log.insert(0, entry);
                    self.publish(&core);
                }
            }
            Err(e) => tracing::warn!(activity = %kind, error = %e, "Failed to record activity"),
        }
    }

    fn now_string(&self) -> String {
        self.clock.now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    // ========== Members ==========

    async fn create_member(self: &Arc<Self>, data: MemberCreate) -> CacheResult<MutationOutcome> {
        validation::validate_member_create(&data)?;
        let (account, epoch) = self.session()?;

        let today = self.clock.today();
        let joining_date = data.joining_date.unwrap_or(today);
        let expiry_date = data
            .expiry_date
            .unwrap_or_else(|| expiry_for(joining_date, data.plan_duration));
        let member = Member {
            id: util::temp_id(),
            user_id: Some(account.account_id.clone()),
            name: data.name.trim().to_string(),
            email: data.email.trim().to_string(),
            phone: data.phone.trim().to_string(),
            plan_duration: data.plan_duration,
            joining_date,
            expiry_date,
            status: derive_status(expiry_date, today),
            qr_token: Some(util::qr_token()),
            branch_id: data.branch_id,
            created_at: None,
            updated_at: None,
        };
        let row = insert_row(&member)?;
        let name = member.name.clone();

        let ticket = self.stage(epoch, Overlay::InsertMember(member))?;
        let saved = match self
            .store
            .insert(MEMBERS.as_str(), row)
            .await
            .and_then(decode::<Member>)
        {
            Ok(saved) => saved,
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        };

        let id = saved.id.clone();
        self.confirm(epoch, ticket, |base| upsert_front(&mut base.members, saved));
        self.record(epoch, &account, ActivityType::MemberAdded, format!("Member \"{name}\" added"))
            .await;
        self.notify(Notice::success("Member added successfully!"));
        Ok(MutationOutcome::Created { id })
    }

    async fn update_member(self: &Arc<Self>, id: String, patch: MemberUpdate) -> CacheResult<MutationOutcome> {
        validation::validate_member_update(&patch)?;
        let (account, epoch) = self.session()?;

        let mut body = patch_body(&patch, &self.now_string())?;
        if let (Some(expiry), Some(map)) = (patch.expiry_date, body.as_object_mut()) {
            let status = derive_status(expiry, self.clock.today());
            map.insert("status".into(), Value::String(status.as_str().to_string()));
        }

        let ticket = self.stage(
            epoch,
            Overlay::UpdateMember {
                id: id.clone(),
                patch,
            },
        )?;
        let result = self
            .store
            .update(MEMBERS.as_str(), owned_filter(&id, &account), body)
            .await
            .map_err(CacheError::remote_write)
            .and_then(|rows| first_row::<Member>(rows, "member", &id));
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => return Err(self.roll_back(epoch, ticket, err).await),
        };

        let description = format!("Member \"{}\" updated", saved.name);
        self.confirm(epoch, ticket, |base| upsert_front(&mut base.members, saved));
        self.record(epoch, &account, ActivityType::MemberUpdated, description).await;
        self.notify(Notice::success("Member updated successfully!"));
        Ok(MutationOutcome::Updated { id })
    }

    async fn delete_member(self: &Arc<Self>, id: String) -> CacheResult<MutationOutcome> {
        let (account, epoch) = self.session()?;
        let known = self.view_lookup(|s| s.member(&id).map(|m| m.name.clone()));

        let ticket = self.stage(epoch, Overlay::DeleteMember(id.clone()))?;
        match self.store.delete(MEMBERS.as_str(), owned_filter(&id, &account)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => tracing::debug!(member_id = %id, "Member already deleted"),
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        }

        self.confirm(epoch, ticket, |base| {
            remove_by_id(&mut base.members, &id);
        });
        if let Some(name) = &known {
            self.record(epoch, &account, ActivityType::MemberDeleted, format!("Member \"{name}\" deleted"))
                .await;
        }
        self.notify(Notice::success("Member deleted successfully!"));
        Ok(MutationOutcome::Deleted {
            id,
            existed: known.is_some(),
        })
    }

    // ========== Payments ==========

    async fn create_payment(self: &Arc<Self>, data: PaymentCreate) -> CacheResult<MutationOutcome> {
        validation::validate_payment_create(&data)?;
        let (account, epoch) = self.session()?;

        let Some(member_name) = self.view_lookup(|s| s.member(&data.member_id).map(|m| m.name.clone())) else {
            return Err(CacheError::NotFound {
                entity: "member",
                id: data.member_id,
            });
        };
        let payment = Payment {
            id: util::temp_id(),
            user_id: Some(account.account_id.clone()),
            member_id: data.member_id,
            member_name: Some(
                data.member_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(member_name),
            ),
            amount: data.amount,
            payment_date: Some(data.payment_date.unwrap_or_else(|| self.clock.today())),
            payment_method: data.payment_method.trim().to_string(),
            status: data.status.unwrap_or_default(),
            plan_name: data.plan_name,
            branch_id: data.branch_id,
            created_at: None,
        };
        let row = insert_row(&payment)?;

        let ticket = self.stage(epoch, Overlay::InsertPayment(payment))?;
        let saved = match self
            .store
            .insert(PAYMENTS.as_str(), row)
            .await
            .and_then(decode::<Payment>)
        {
            Ok(saved) => saved,
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        };

        let id = saved.id.clone();
        let description = format!(
            "Payment of ₹{} added for {}",
            saved.amount,
            saved.member_name.as_deref().unwrap_or_default()
        );
        self.confirm(epoch, ticket, |base| upsert_front(&mut base.payments, saved));
        self.record(epoch, &account, ActivityType::PaymentAdded, description).await;
        self.notify(Notice::success("Payment added successfully!"));
        Ok(MutationOutcome::Created { id })
    }

    async fn update_payment(self: &Arc<Self>, id: String, patch: PaymentUpdate) -> CacheResult<MutationOutcome> {
        validation::validate_payment_update(&patch)?;
        let (account, epoch) = self.session()?;
        let body = patch_body(&patch, &self.now_string())?;

        let ticket = self.stage(
            epoch,
            Overlay::UpdatePayment {
                id: id.clone(),
                patch,
            },
        )?;
        let result = self
            .store
            .update(PAYMENTS.as_str(), owned_filter(&id, &account), body)
            .await
            .map_err(CacheError::remote_write)
            .and_then(|rows| first_row::<Payment>(rows, "payment", &id));
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => return Err(self.roll_back(epoch, ticket, err).await),
        };

        let description = format!(
            "Payment for {} updated",
            saved.member_name.as_deref().unwrap_or_default()
        );
        self.confirm(epoch, ticket, |base| upsert_front(&mut base.payments, saved));
        self.record(epoch, &account, ActivityType::PaymentUpdated, description).await;
        self.notify(Notice::success("Payment updated successfully!"));
        Ok(MutationOutcome::Updated { id })
    }

    async fn delete_payment(self: &Arc<Self>, id: String) -> CacheResult<MutationOutcome> {
        let (account, epoch) = self.session()?;
        let known = self.view_lookup(|s| {
            s.payment(&id)
                .map(|p| p.member_name.clone().unwrap_or_default())
        });

        let ticket = self.stage(epoch, Overlay::DeletePayment(id.clone()))?;
        match self.store.delete(PAYMENTS.as_str(), owned_filter(&id, &account)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => tracing::debug!(payment_id = %id, "Payment already deleted"),
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        }

        self.confirm(epoch, ticket, |base| {
            remove_by_id(&mut base.payments, &id);
        });
        if let Some(name) = &known {
            self.record(epoch, &account, ActivityType::PaymentDeleted, format!("Payment for {name} deleted"))
                .await;
        }
        self.notify(Notice::success("Payment deleted successfully!"));
        Ok(MutationOutcome::Deleted {
            id,
            existed: known.is_some(),
        })
    }

    // ========== Plans ==========

    async fn create_plan(self: &Arc<Self>, data: PlanCreate) -> CacheResult<MutationOutcome> {
        validation::validate_plan_create(&data)?;
        let (account, epoch) = self.session()?;

        let plan = Plan {
            id: util::temp_id(),
            user_id: Some(account.account_id.clone()),
            name: data.name.trim().to_string(),
            price: data.price,
            duration: data.duration,
            features: data.features,
            branch_id: data.branch_id,
            created_at: None,
            updated_at: None,
        };
        let row = insert_row(&plan)?;
        let name = plan.name.clone();

        let ticket = self.stage(epoch, Overlay::InsertPlan(plan))?;
        let saved = match self
            .store
            .insert(PLANS.as_str(), row)
            .await
            .and_then(decode::<Plan>)
        {
            Ok(saved) => saved,
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        };

        let id = saved.id.clone();
        self.confirm(epoch, ticket, |base| upsert_plan(&mut base.plans, saved));
        self.record(epoch, &account, ActivityType::PlanAdded, format!("Plan \"{name}\" added"))
            .await;
        self.notify(Notice::success("Plan added successfully!"));
        Ok(MutationOutcome::Created { id })
    }

    async fn update_plan(self: &Arc<Self>, id: String, patch: PlanUpdate) -> CacheResult<MutationOutcome> {
        validation::validate_plan_update(&patch)?;
        let (account, epoch) = self.session()?;
        let body = patch_body(&patch, &self.now_string())?;

        let ticket = self.stage(
            epoch,
            Overlay::UpdatePlan {
                id: id.clone(),
                patch,
            },
        )?;
        let result = self
            .store
            .update(PLANS.as_str(), owned_filter(&id, &account), body)
            .await
            .map_err(CacheError::remote_write)
            .and_then(|rows| first_row::<Plan>(rows, "plan", &id));
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => return Err(self.roll_back(epoch, ticket, err).await),
        };

        let description = format!("Plan \"{}\" updated", saved.name);
        self.confirm(epoch, ticket, |base| upsert_plan(&mut base.plans, saved));
        self.record(epoch, &account, ActivityType::PlanUpdated, description).await;
        self.notify(Notice::success("Plan updated successfully!"));
        Ok(MutationOutcome::Updated { id })
    }

    async fn delete_plan(self: &Arc<Self>, id: String) -> CacheResult<MutationOutcome> {
        let (account, epoch) = self.session()?;
        let known = self.view_lookup(|s| s.plan(&id).map(|p| p.name.clone()));

        let ticket = self.stage(epoch, Overlay::DeletePlan(id.clone()))?;
        match self.store.delete(PLANS.as_str(), owned_filter(&id, &account)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => tracing::debug!(plan_id = %id, "Plan already deleted"),
            Err(e) => return Err(self.roll_back(epoch, ticket, CacheError::remote_write(e)).await),
        }

        self.confirm(epoch, ticket, |base| {
            remove_by_id(&mut base.plans, &id);
        });
        if let Some(name) = &known {
            self.record(epoch, &account, ActivityType::PlanDeleted, format!("Plan \"{name}\" deleted"))
                .await;
        }
        self.notify(Notice::success("Plan deleted successfully!"));
        Ok(MutationOutcome::Deleted {
            id,
            existed: known.is_some(),
        })
    }

    // ========== Profile ==========

    /// Profile writes are not optimistic: write, then refetch
    async fn update_profile(self: &Arc<Self>, update: ProfileUpdate) -> CacheResult<MutationOutcome> {
        validation::validate_profile_update(&update)?;
        let (account, epoch) = self.session()?;
        let body = patch_body(&update, &self.now_string())?;

        self.store
            .update(
                ChangeTable::Users.as_str(),
                Filter::by_id(account.account_id.as_str()),
                body,
            )
            .await
            .map_err(CacheError::remote_write)?;

        let marker = self.current_seq();
        if let Err(e) = self.fetch_after(marker).await {
            tracing::warn!(error = %e, "Refetch after profile update failed");
        }
        self.record(epoch, &account, ActivityType::ProfileUpdated, "Profile updated".to_string())
            .await;
        self.notify(Notice::success("Profile updated successfully!"));
        Ok(MutationOutcome::ProfileUpdated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_row_drops_generated_columns() {
        let row = insert_row(&json!({"id": "temp-1", "name": "Gold", "created_at": null})).unwrap();
        assert_eq!(row, json!({"name": "Gold"}));
    }

    #[test]
    fn test_patch_body_skips_absent_fields() {
        let patch = PlanUpdate {
            name: Some("Gold".into()),
            ..Default::default()
        };
        let body = patch_body(&patch, "2025-06-15T09:00:00.000Z").unwrap();
        assert_eq!(body, json!({"name": "Gold", "updated_at": "2025-06-15T09:00:00.000Z"}));
    }

    #[test]
    fn test_first_row_not_found() {
        let err = first_row::<Plan>(vec![], "plan", "p1").unwrap_err();
        assert!(matches!(err, CacheError::NotFound { entity: "plan", .. }));
    }

    #[test]
    fn test_outcome_entity_id() {
        assert_eq!(
            MutationOutcome::Deleted {
                id: "m1".into(),
                existed: false
            }
            .entity_id(),
            Some("m1")
        );
        assert_eq!(MutationOutcome::ProfileUpdated.entity_id(), None);
    }
}
