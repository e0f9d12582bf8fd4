//! Calendar event entity for SeaORM.

use sea_orm::{NotSet, Set};
use sea_orm::entity::prelude::*;

use fellowship_core::domain::Event;

// f64 columns rule out `Eq`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: DateTimeWithTimeZone,
    pub ends_at: DateTimeWithTimeZone,
    pub max_attendees: Option<i32>,
    pub attendee_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_attendee::Entity")]
    Attendee,
}

impl Related<super::event_attendee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Event {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            location: model.location,
            latitude: model.latitude,
            longitude: model.longitude,
            starts_at: model.starts_at.into(),
            ends_at: model.ends_at.into(),
            max_attendees: model.max_attendees,
            attendee_count: model.attendee_count,
            created_by: model.created_by,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<Event> for ActiveModel {
    fn from(event: Event) -> Self {
        Self {
            id: Set(event.id),
            title: Set(event.title),
            description: Set(event.description),
            location: Set(event.location),
            latitude: Set(event.latitude),
            longitude: Set(event.longitude),
            starts_at: Set(event.starts_at.into()),
            ends_at: Set(event.ends_at.into()),
            max_attendees: Set(event.max_attendees),
            // Owned by the attend/cancel queries; the column defaults to 0.
            attendee_count: NotSet,
            created_by: Set(event.created_by),
            created_at: Set(event.created_at.into()),
            updated_at: Set(event.updated_at.into()),
        }
    }
}
