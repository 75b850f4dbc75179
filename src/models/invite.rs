use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use time::OffsetDateTime;

/// How many more redemptions an invite allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uses {
    Limited(NonZeroU32),
    Unlimited,
}

impl Uses {
    pub const SINGLE: Self = Self::Limited(NonZeroU32::MIN);

    /// Reads the stored encoding, where a zero count or the no-limit flag both mean unlimited.
    pub fn from_legacy(remaining_uses: u32, no_limit: bool) -> Self {
        match NonZeroU32::new(remaining_uses) {
            Some(n) if !no_limit => Self::Limited(n),
            _ => Self::Unlimited,
        }
    }

    pub fn to_legacy(self) -> (u32, bool) {
        match self {
            Self::Limited(n) => (n.get(), false),
            Self::Unlimited => (0, true),
        }
    }

    /// Takes one use. `None` means the invite is spent and must be removed.
    pub fn consume(self) -> Option<Self> {
        match self {
            Self::Limited(n) => NonZeroU32::new(n.get() - 1).map(Self::Limited),
            Self::Unlimited => Some(Self::Unlimited),
        }
    }

    /// Returns a use taken by `consume`.
    pub fn give_back(self) -> Self {
        match self {
            Self::Limited(n) => Self::Limited(n.saturating_add(1)),
            Self::Unlimited => Self::Unlimited,
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Unlimited invites show a count of one, as they always have.
    pub fn display_count(self) -> u32 {
        match self {
            Self::Limited(n) => n.get(),
            Self::Unlimited => 1,
        }
    }
}

/// Per-address subscription to invite events. An absent flag is distinct from `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyFlags {
    #[serde(
        rename = "notify-expiry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<bool>,
    #[serde(
        rename = "notify-creation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub creation: Option<bool>,
}

impl NotifyFlags {
    /// Writes only the flags present in `update`. A flag counts as changed when it
    /// differs from the current value, with absent read as `false`.
    pub fn merge(&mut self, update: NotifyFlags) -> bool {
        let mut changed = false;
        for (slot, new) in [
            (&mut self.expiry, update.expiry),
            (&mut self.creation, update.creation),
        ] {
            if let Some(v) = new {
                if slot.unwrap_or(false) != v {
                    *slot = Some(v);
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn wants_expiry(&self) -> bool {
        self.expiry.unwrap_or(false)
    }

    pub fn wants_creation(&self) -> bool {
        self.creation.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub code: String,
    pub created: OffsetDateTime,
    pub valid_till: OffsetDateTime,
    pub uses: Uses,
    pub email: Option<String>,
    /// Empty means no profile is applied on redemption.
    pub profile: String,
    pub used_by: Vec<(String, String)>,
    pub notify: BTreeMap<String, NotifyFlags>,
}

impl Invite {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.valid_till
    }

    pub fn expiry_subscribers(&self) -> impl Iterator<Item = &str> {
        self.notify
            .iter()
            .filter(|(_, f)| f.wants_expiry())
            .map(|(addr, _)| addr.as_str())
    }

    pub fn creation_subscribers(&self) -> impl Iterator<Item = &str> {
        self.notify
            .iter()
            .filter(|(_, f)| f.wants_creation())
            .map(|(addr, _)| addr.as_str())
    }

    pub fn from_record(code: String, r: InviteRecord) -> Self {
        Self {
            code,
            created: r.created,
            valid_till: r.valid_till,
            uses: Uses::from_legacy(r.remaining_uses, r.no_limit),
            email: r.email,
            profile: r.profile,
            used_by: r.used_by,
            notify: r.notify,
        }
    }
}

/// The persisted payload of an invite, keyed by code outside the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InviteRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_till: OffsetDateTime,
    #[serde(default)]
    pub remaining_uses: u32,
    #[serde(default)]
    pub no_limit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_by: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notify: BTreeMap<String, NotifyFlags>,
}

impl From<&Invite> for InviteRecord {
    fn from(inv: &Invite) -> Self {
        let (remaining_uses, no_limit) = inv.uses.to_legacy();
        Self {
            created: inv.created,
            valid_till: inv.valid_till,
            remaining_uses,
            no_limit,
            email: inv.email.clone(),
            profile: inv.profile.clone(),
            used_by: inv.used_by.clone(),
            notify: inv.notify.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GenerateInviteReq {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub email: Option<String>,
    pub multiple_uses: bool,
    pub no_limit: bool,
    pub remaining_uses: u32,
    pub profile: Option<String>,
}

/// One row of the invite listing, shaped for the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InviteSummary {
    pub code: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub years: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub created: String,
    pub profile: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub used_by: Vec<(String, String)>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_limit: bool,
    pub remaining_uses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_expiry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_creation: Option<bool>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteList {
    pub profiles: Vec<String>,
    pub invites: Vec<InviteSummary>,
}
