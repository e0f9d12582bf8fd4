//! Notification and notification settings entities for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use fellowship_core::domain::{Notification, NotificationKind};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            kind: model.kind.parse().unwrap_or(NotificationKind::System),
            title: model.title,
            message: model.message,
            link: model.link,
            read: model.read,
            created_at: model.created_at.into(),
        }
    }
}

impl From<Notification> for ActiveModel {
    fn from(n: Notification) -> Self {
        Self {
            id: Set(n.id),
            user_id: Set(n.user_id),
            kind: Set(n.kind.as_str().to_string()),
            title: Set(n.title),
            message: Set(n.message),
            link: Set(n.link),
            read: Set(n.read),
            created_at: Set(n.created_at.into()),
        }
    }
}
