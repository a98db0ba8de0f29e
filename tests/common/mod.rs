//! Shared fixture: a small work-tracking resource graph.

#![allow(dead_code)]

use jsonapi_adapter::{
    AttrCapabilities, BoxError, Identifiable, RelationshipCapabilities, ResourceGraph,
    ResourceGraphBuilder,
};

#[derive(Default, Debug)]
pub struct WorkItem {
    pub id: Option<i64>,
    pub local_id: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub assignee: Option<UserAccount>,
    pub subscribers: Vec<UserAccount>,
    pub tags: Vec<Tag>,
}

impl Identifiable for WorkItem {
    fn string_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
        self.id = match value {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(())
    }

    fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    fn assign_local_id(&mut self, value: Option<&str>) {
        self.local_id = value.map(str::to_owned);
    }
}

#[derive(Default, Debug)]
pub struct UserAccount {
    pub id: Option<i64>,
    pub local_id: Option<String>,
    pub display_name: Option<String>,
}

impl Identifiable for UserAccount {
    fn string_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
        self.id = match value {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(())
    }

    fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    fn assign_local_id(&mut self, value: Option<&str>) {
        self.local_id = value.map(str::to_owned);
    }
}

#[derive(Default, Debug)]
pub struct Tag {
    pub id: Option<i64>,
    pub local_id: Option<String>,
    pub label: Option<String>,
}

impl Identifiable for Tag {
    fn string_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
        self.id = match value {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(())
    }

    fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    fn assign_local_id(&mut self, value: Option<&str>) {
        self.local_id = value.map(str::to_owned);
    }
}

pub fn work_graph() -> ResourceGraph {
    ResourceGraphBuilder::new()
        .resource::<WorkItem>("workItems", |item| {
            item.attribute(
                "description",
                AttrCapabilities::ALL,
                |item: &mut WorkItem, value: Option<String>| item.description = value,
            )
            .attribute(
                "priority",
                AttrCapabilities::ALL,
                |item: &mut WorkItem, value: Option<i64>| item.priority = value,
            )
            .has_one::<UserAccount, _>(
                "assignee",
                "userAccounts",
                true,
                RelationshipCapabilities::ALL,
                |item: &mut WorkItem, value: Option<UserAccount>| item.assignee = value,
            )
            .has_many::<UserAccount, _>(
                "subscribers",
                "userAccounts",
                RelationshipCapabilities::ALL,
                |item: &mut WorkItem, value: Vec<UserAccount>| item.subscribers = value,
            )
            .has_many::<Tag, _>(
                "tags",
                "tags",
                RelationshipCapabilities::ALL,
                |item: &mut WorkItem, value: Vec<Tag>| item.tags = value,
            )
        })
        .resource::<UserAccount>("userAccounts", |account| {
            account.attribute(
                "displayName",
                AttrCapabilities::ALL,
                |account: &mut UserAccount, value: Option<String>| account.display_name = value,
            )
        })
        .resource::<Tag>("tags", |tag| {
            tag.attribute(
                "label",
                AttrCapabilities::ALL,
                |tag: &mut Tag, value: Option<String>| tag.label = value,
            )
        })
        .build()
        .unwrap()
}
