//! Single-read alerts kept in the session, one slot per page family.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Danger,
            message: message.into(),
        }
    }
}

/// Page families that own an alert slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSlot {
    LoginPage,
    RequestChangePasswordPage,
    CmsProjectsPage,
    CmsProjectUpdatePage,
    CmsAccountsPage,
    CmsPersonalDataPage,
    CmsSocialLinksPage,
}

impl AlertSlot {
    pub const ALL: [Self; 7] = [
        Self::LoginPage,
        Self::RequestChangePasswordPage,
        Self::CmsProjectsPage,
        Self::CmsProjectUpdatePage,
        Self::CmsAccountsPage,
        Self::CmsPersonalDataPage,
        Self::CmsSocialLinksPage,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginPage => "loginPageAlert",
            Self::RequestChangePasswordPage => "requestChangePasswordPageAlert",
            Self::CmsProjectsPage => "cmsProjectsPageAlert",
            Self::CmsProjectUpdatePage => "cmsProjectUpdatePageAlert",
            Self::CmsAccountsPage => "cmsAccountsPageAlert",
            Self::CmsPersonalDataPage => "cmsPersonalDataPageAlert",
            Self::CmsSocialLinksPage => "cmsSocialLinksPageAlert",
        }
    }
}

impl fmt::Display for AlertSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending alerts of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSlots {
    login_page: Option<Alert>,
    request_change_password_page: Option<Alert>,
    cms_projects_page: Option<Alert>,
    cms_project_update_page: Option<Alert>,
    cms_accounts_page: Option<Alert>,
    cms_personal_data_page: Option<Alert>,
    cms_social_links_page: Option<Alert>,
}

impl AlertSlots {
    fn slot_mut(&mut self, slot: AlertSlot) -> &mut Option<Alert> {
        match slot {
            AlertSlot::LoginPage => &mut self.login_page,
            AlertSlot::RequestChangePasswordPage => &mut self.request_change_password_page,
            AlertSlot::CmsProjectsPage => &mut self.cms_projects_page,
            AlertSlot::CmsProjectUpdatePage => &mut self.cms_project_update_page,
            AlertSlot::CmsAccountsPage => &mut self.cms_accounts_page,
            AlertSlot::CmsPersonalDataPage => &mut self.cms_personal_data_page,
            AlertSlot::CmsSocialLinksPage => &mut self.cms_social_links_page,
        }
    }

    /// Store `alert` in `slot`, replacing whatever was pending there.
    pub fn write(&mut self, slot: AlertSlot, alert: Alert) {
        *self.slot_mut(slot) = Some(alert);
    }

    /// Take the pending alert of `slot`, leaving it empty.
    pub fn read_and_clear(&mut self, slot: AlertSlot) -> Option<Alert> {
        self.slot_mut(slot).take()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.login_page,
            &self.request_change_password_page,
            &self.cms_projects_page,
            &self.cms_project_update_page,
            &self.cms_accounts_page,
            &self.cms_personal_data_page,
            &self.cms_social_links_page,
        ]
        .iter()
        .all(|slot| slot.is_none())
    }
}
