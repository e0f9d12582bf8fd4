use sea_orm::Set;
use sea_orm::entity::prelude::*;

use fellowship_core::domain::NotificationSettings;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub email_enabled: bool,
    pub comments: bool,
    pub likes: bool,
    pub events: bool,
    pub reminders: bool,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for NotificationSettings {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            email_enabled: model.email_enabled,
            comments: model.comments,
            likes: model.likes,
            events: model.events,
            reminders: model.reminders,
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<NotificationSettings> for ActiveModel {
    fn from(s: NotificationSettings) -> Self {
        Self {
            user_id: Set(s.user_id),
            email_enabled: Set(s.email_enabled),
            comments: Set(s.comments),
            likes: Set(s.likes),
            events: Set(s.events),
            reminders: Set(s.reminders),
            updated_at: Set(s.updated_at.into()),
        }
    }
}
