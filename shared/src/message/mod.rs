//! 变更通知与用户提示消息
//!
//! `ChangeEvent` 来自远端存储的实时通道，只表示"有东西变了"，不携带行数据；
//! 收到后缓存整体重新拉取。`Notice` 是发给界面的提示（类似 toast）。

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod payload;
pub use payload::*;

/// 实时通道覆盖的表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Members,
    Payments,
    Plans,
    Attendance,
    /// 账户资料 (`users` 表)
    Users,
    StaffMembers,
    Branches,
    ActivityLog,
}

impl ChangeTable {
    /// Tables a cache session subscribes to
    pub const WATCHED: [ChangeTable; 6] = [
        ChangeTable::Members,
        ChangeTable::Payments,
        ChangeTable::Plans,
        ChangeTable::Attendance,
        ChangeTable::Users,
        ChangeTable::StaffMembers,
    ];

    /// Table name in the remote store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Payments => "payments",
            Self::Plans => "plans",
            Self::Attendance => "attendance",
            Self::Users => "users",
            Self::StaffMembers => "staff_members",
            Self::Branches => "branches",
            Self::ActivityLog => "activity_log",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "members" => Some(Self::Members),
            "payments" => Some(Self::Payments),
            "plans" => Some(Self::Plans),
            "attendance" => Some(Self::Attendance),
            "users" => Some(Self::Users),
            "staff_members" => Some(Self::StaffMembers),
            "branches" => Some(Self::Branches),
            "activity_log" => Some(Self::ActivityLog),
            _ => None,
        }
    }

    /// Column holding the owning account id
    pub fn owner_column(&self) -> &'static str {
        match self {
            Self::Users => "id",
            Self::Branches => "owner_id",
            _ => "user_id",
        }
    }

    /// Whether a change here should invalidate a cache snapshot
    pub fn is_watched(&self) -> bool {
        Self::WATCHED.contains(self)
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 行变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// 变更信号 (远端 -> 客户端)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub operation: ChangeOperation,
}

impl ChangeEvent {
    pub fn new(table: ChangeTable, operation: ChangeOperation) -> Self {
        Self { table, operation }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_wire_format() {
        let event = ChangeEvent::new(ChangeTable::StaffMembers, ChangeOperation::Delete);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"table":"staff_members","operation":"DELETE"}"#);
        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_table_names_round_trip() {
        for table in ChangeTable::WATCHED {
            assert_eq!(ChangeTable::from_name(table.as_str()), Some(table));
        }
        assert_eq!(ChangeTable::from_name("orders"), None);
    }

    #[test]
    fn test_owner_columns() {
        assert_eq!(ChangeTable::Users.owner_column(), "id");
        assert_eq!(ChangeTable::Branches.owner_column(), "owner_id");
        assert_eq!(ChangeTable::Members.owner_column(), "user_id");
        assert!(!ChangeTable::ActivityLog.is_watched());
        assert!(ChangeTable::Users.is_watched());
    }
}
