//! Intent 模块 - 基于意图的统一变更入口
//!
//! 界面发出的每个增删改操作都是一个 `GymIntent`，由缓存的唯一入口
//! `apply_mutation` 处理。

use serde::{Deserialize, Serialize};

use crate::message::ChangeTable;
use crate::models::{
    MemberCreate, MemberUpdate, PaymentCreate, PaymentUpdate, PlanCreate, PlanUpdate,
    ProfileUpdate,
};

/// 通用 CRUD 操作
///
/// 泛型参数：
/// - `C`: Create 数据类型
/// - `U`: Update 数据类型 (字段为 Option)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CrudAction<C, U> {
    /// 创建
    Create(C),
    /// 更新 (需要 ID 和部分数据)
    Update { id: String, data: U },
    /// 删除 (只需要 ID)
    Delete { id: String },
}

impl<C, U> CrudAction<C, U> {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Target id for update/delete
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Create(_) => None,
            Self::Update { id, .. } | Self::Delete { id } => Some(id),
        }
    }
}

/// 变更意图
///
/// ```json
/// {
///   "model": "Member",
///   "action": { "type": "Delete", "data": { "id": "0b7e…" } }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", content = "action")]
pub enum GymIntent {
    /// 会员
    Member(CrudAction<MemberCreate, MemberUpdate>),
    /// 收款
    Payment(CrudAction<PaymentCreate, PaymentUpdate>),
    /// 套餐
    Plan(CrudAction<PlanCreate, PlanUpdate>),
    /// 账户资料
    Profile(ProfileUpdate),
}

impl GymIntent {
    pub fn table(&self) -> ChangeTable {
        match self {
            Self::Member(_) => ChangeTable::Members,
            Self::Payment(_) => ChangeTable::Payments,
            Self::Plan(_) => ChangeTable::Plans,
            Self::Profile(_) => ChangeTable::Users,
        }
    }

    /// Short label for logs, e.g. `member.update`
    pub fn label(&self) -> String {
        let verb = match self {
            Self::Member(a) => a.verb(),
            Self::Payment(a) => a.verb(),
            Self::Plan(a) => a.verb(),
            Self::Profile(_) => "update",
        };
        let model = match self {
            Self::Member(_) => "member",
            Self::Payment(_) => "payment",
            Self::Plan(_) => "plan",
            Self::Profile(_) => "profile",
        };
        format!("{model}.{verb}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_serialization() {
        let intent = GymIntent::Member(CrudAction::Create(MemberCreate {
            name: "Asha".to_string(),
            phone: "98765".to_string(),
            plan_duration: 3,
            ..Default::default()
        }));

        let json = serde_json::to_string(&intent).unwrap();
        let parsed: GymIntent = serde_json::from_str(&json).unwrap();
        match parsed {
            GymIntent::Member(CrudAction::Create(dto)) => {
                assert_eq!(dto.name, "Asha");
                assert_eq!(dto.plan_duration, 3);
            }
            _ => panic!("Unexpected variant"),
        }
    }

    #[test]
    fn test_crud_action_delete() {
        let intent = GymIntent::Plan(CrudAction::Delete {
            id: "pl_1".to_string(),
        });
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"model\":\"Plan\""));
        assert!(json.contains("\"type\":\"Delete\""));
        assert_eq!(intent.label(), "plan.delete");
        assert_eq!(intent.table(), ChangeTable::Plans);
    }

    #[test]
    fn test_target_id() {
        let action: CrudAction<PaymentCreate, PaymentUpdate> = CrudAction::Update {
            id: "p9".into(),
            data: PaymentUpdate::default(),
        };
        assert_eq!(action.target_id(), Some("p9"));
        assert_eq!(action.verb(), "update");
    }
}
