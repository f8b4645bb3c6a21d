//! Attendance check-in
//!
//! Both paths write to the store and then refresh the snapshot; the attendance
//! list is never edited locally.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::message::{ChangeTable, Notice};
use shared::models::AttendanceCreate;
use shared::util::is_member_qr_token;

use super::{CacheInner, GymCache};
use crate::error::{CacheError, CacheResult};
use crate::store::{CHECK_IN_BY_QR, decode, owned_row};

const CHECK_IN_FALLBACK: &str = "Could not check in member.";

/// A recorded check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInResult {
    pub member_id: Option<String>,
    pub member_name: String,
}

/// `check_in_by_qr` response
#[derive(Debug, Deserialize)]
struct ProcedureReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    member: Option<ProcedureMember>,
}

#[derive(Debug, Deserialize)]
struct ProcedureMember {
    #[serde(default)]
    id: Option<String>,
    name: String,
}

impl GymCache {
    /// Check a member in from a scanned QR payload
    pub async fn check_in_by_qr(&self, token: &str, device_id: Option<&str>) -> CacheResult<CheckInResult> {
        let result = self.inner.qr_check_in(token.trim(), device_id).await;
        self.inner.report_check_in(&result);
        result
    }

    /// Check a member in from the front desk
    pub async fn check_in_manual(&self, member_id: &str) -> CacheResult<CheckInResult> {
        let result = self.inner.manual_check_in(member_id).await;
        self.inner.report_check_in(&result);
        result
    }
}

impl CacheInner {
    fn report_check_in(&self, result: &CacheResult<CheckInResult>) {
        match result {
            Ok(done) => {
                tracing::info!(member_id = ?done.member_id, member = %done.member_name, "Member checked in");
                self.notify(Notice::success(format!("{} has been marked present.", done.member_name)));
            }
            Err(err) => {
                tracing::debug!(code = ?err.code(), error = %err, "Check-in rejected");
                self.notify_error(err);
            }
        }
    }

    async fn qr_check_in(self: &Arc<Self>, token: &str, device_id: Option<&str>) -> CacheResult<CheckInResult> {
        if !is_member_qr_token(token) {
            return Err(CacheError::InvalidQrToken);
        }
        let (account, _) = self.session()?;
        let branch_id = self.view_lookup(|s| s.current_branch_id().map(str::to_string));

        let args = json!({
            "p_user_id": account.account_id,
            "p_qr_token": token,
            "p_branch_id": branch_id,
            "p_device_id": device_id,
        });
        let marker = self.current_seq();
        let reply: ProcedureReply = self
            .store
            .rpc(CHECK_IN_BY_QR, args)
            .await
            .and_then(decode)
            .map_err(CacheError::remote_write)?;

        if !reply.success {
            let reason = reply
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| CHECK_IN_FALLBACK.to_string());
            return Err(CacheError::CheckInRejected(reason));
        }
        let member = reply.member.ok_or_else(|| CacheError::CheckInRejected(CHECK_IN_FALLBACK.to_string()))?;

        if let Err(e) = self.fetch_after(marker).await {
            tracing::warn!(error = %e, "Refresh after check-in failed");
        }
        Ok(CheckInResult {
            member_id: member.id,
            member_name: member.name,
        })
    }

    async fn manual_check_in(self: &Arc<Self>, member_id: &str) -> CacheResult<CheckInResult> {
        let (account, _) = self.session()?;
        let today = self.clock.today();

        let found = self.view_lookup(|s| {
            s.member(member_id)
                .map(|m| (m.name.clone(), s.has_checked_in(member_id, today), s.current_branch_id().map(str::to_string)))
        });
        let Some((member_name, already, branch_id)) = found else {
            return Err(CacheError::NotFound {
                entity: "member",
                id: member_id.to_string(),
            });
        };
        if already {
            return Err(CacheError::AlreadyCheckedIn { member_name });
        }

        let entry = AttendanceCreate {
            member_id: member_id.to_string(),
            member_name: member_name.clone(),
            check_in: self.clock.now(),
            source: Some("manual".to_string()),
            device_id: None,
            branch_id,
        };
        let row = owned_row(&entry, "user_id", &account.account_id).map_err(CacheError::remote_write)?;
        let marker = self.current_seq();
        self.store
            .insert(ChangeTable::Attendance.as_str(), row)
            .await
            .map_err(CacheError::remote_write)?;

        if let Err(e) = self.fetch_after(marker).await {
            tracing::warn!(error = %e, "Refresh after check-in failed");
        }
        Ok(CheckInResult {
            member_id: Some(member_id.to_string()),
            member_name,
        })
    }
}
