//! Course portal backed by configuration.

use async_trait::async_trait;
use autotest_core::ports::CoursePortal;
use autotest_core::{AuthInfo, ContainerConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deliverables and roster for one course offering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Deliverable graded on push when the event names none.
    #[serde(default)]
    pub default_deliverable: Option<String>,
    #[serde(default)]
    pub staff: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub deliverables: BTreeMap<String, ContainerConfig>,
}

pub struct StaticCoursePortal {
    course: CourseConfig,
}

impl StaticCoursePortal {
    pub fn new(course: CourseConfig) -> Self {
        Self { course }
    }

    pub fn course(&self) -> &CourseConfig {
        &self.course
    }
}

#[async_trait]
impl CoursePortal for StaticCoursePortal {
    async fn default_deliverable_id(&self) -> Result<Option<String>> {
        // "null" has shown up in hand-edited configs
        Ok(self
            .course
            .default_deliverable
            .clone()
            .filter(|d| !d.is_empty() && d != "null"))
    }

    async fn is_staff(&self, person_id: &str) -> Result<AuthInfo> {
        Ok(AuthInfo {
            is_staff: self.course.staff.iter().any(|p| p == person_id),
            is_admin: self.course.admins.iter().any(|p| p == person_id),
        })
    }

    async fn container_config(&self, deliv_id: &str) -> Result<Option<ContainerConfig>> {
        Ok(self.course.deliverables.get(deliv_id).cloned())
    }
}
