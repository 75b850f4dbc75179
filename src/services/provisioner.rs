use crate::models::profile::{Profile, Template};
use crate::services::media::{MediaError, MediaServer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Steps of a single-user profile application that failed. Nothing is rolled back.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayprefs: Option<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.policy.is_none() && self.configuration.is_none() && self.displayprefs.is_none()
    }
}

/// Per-target failures of a batch application, split by what was being applied.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchErrors {
    pub policy: BTreeMap<String, String>,
    pub homescreen: BTreeMap<String, String>,
}

impl BatchErrors {
    /// Every target failed in at least one of the two maps.
    pub fn all_failed(&self, targets: usize) -> bool {
        targets > 0 && (self.policy.len() == targets || self.homescreen.len() == targets)
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty() && self.homescreen.is_empty()
    }
}

fn describe(e: &MediaError) -> String {
    format!("{}: {}", e.status(), e)
}

pub struct Provisioner {
    media: Arc<dyn MediaServer>,
}

impl Provisioner {
    pub fn new(media: Arc<dyn MediaServer>) -> Self {
        Self { media }
    }

    /// Policy first, then configuration, and display preferences only once the
    /// configuration was accepted.
    pub async fn apply_profile(&self, user_id: &str, profile: &Profile) -> ApplyReport {
        let mut report = ApplyReport::default();
        if !profile.policy.is_empty() {
            if let Err(e) = self.media.set_policy(user_id, &profile.policy).await {
                tracing::error!("{}: Failed to set user policy: {}", user_id, e);
                report.policy = Some(describe(&e));
            }
        }
        if let Some((configuration, displayprefs)) = profile.homescreen() {
            match self.media.set_configuration(user_id, configuration).await {
                Ok(()) => {
                    if let Err(e) = self
                        .media
                        .set_display_preferences(user_id, displayprefs)
                        .await
                    {
                        tracing::error!("{}: Failed to set display preferences: {}", user_id, e);
                        report.displayprefs = Some(describe(&e));
                    }
                }
                Err(e) => {
                    tracing::error!("{}: Failed to set configuration template: {}", user_id, e);
                    report.configuration = Some(describe(&e));
                }
            }
        }
        report
    }

    /// Applies `policy` (and the homescreen pair when given) to every target in order,
    /// collecting failures instead of stopping.
    pub async fn apply_to_users(
        &self,
        ids: &[String],
        policy: &Template,
        homescreen: Option<(&Template, &Template)>,
    ) -> BatchErrors {
        let mut errors = BatchErrors::default();
        for id in ids {
            if let Err(e) = self.media.set_policy(id, policy).await {
                errors.policy.insert(id.clone(), describe(&e));
            }
            let Some((configuration, displayprefs)) = homescreen else {
                continue;
            };
            let failure = match self.media.set_configuration(id, configuration).await {
                Err(e) => Some(format!("Configuration {}", describe(&e))),
                Ok(()) => self
                    .media
                    .set_display_preferences(id, displayprefs)
                    .await
                    .err()
                    .map(|e| format!("Displayprefs {}", describe(&e))),
            };
            if let Some(f) = failure {
                errors.homescreen.insert(id.clone(), f);
            }
        }
        if !errors.is_empty() {
            tracing::debug!("Batch application errors: {:?}", errors);
        }
        errors
    }
}
