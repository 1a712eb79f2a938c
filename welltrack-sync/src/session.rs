//! Explicit session context.
//!
//! The composition root owns one [`SessionContext`] per running app and hands
//! it by reference to whatever needs to know which profile is active. Nothing
//! in this crate keeps session state in a global.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use welltrack_types::{DeviceId, UserId};

/// A user profile known on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
}

impl UserProfile {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Timing of the current profile session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Which profile is active on this device.
#[derive(Debug, Clone)]
pub struct SessionContext {
    device_id: DeviceId,
    profiles: Vec<UserProfile>,
    active: Option<ActiveSession>,
    switch_count: u32,
}

impl SessionContext {
    /// Creates a context with no profiles and nobody signed in.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            profiles: Vec::new(),
            active: None,
            switch_count: 0,
        }
    }

    /// Creates a context with `profile` registered and active.
    pub fn with_active(device_id: DeviceId, profile: UserProfile) -> Self {
        let mut ctx = Self::new(device_id);
        ctx.set_active_profile(profile);
        ctx
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn profiles(&self) -> &[UserProfile] {
        &self.profiles
    }

    pub fn profile(&self, user_id: &UserId) -> Option<&UserProfile> {
        self.profiles.iter().find(|p| &p.user_id == user_id)
    }

    pub fn has_multiple_profiles(&self) -> bool {
        self.profiles.len() > 1
    }

    /// Replaces the known profiles. If nobody is active, the first profile
    /// becomes active.
    pub fn update_profiles(&mut self, profiles: Vec<UserProfile>) {
        self.profiles = profiles;
        if self.active.is_none() {
            if let Some(first) = self.profiles.first().cloned() {
                self.set_active_profile(first);
            }
        }
    }

    /// Makes `profile` active, registering it if it is new. Starts a fresh
    /// session and counts as a profile switch.
    pub fn set_active_profile(&mut self, profile: UserProfile) {
        let now = Utc::now();
        if self.profile(&profile.user_id).is_none() {
            self.profiles.push(profile.clone());
        }
        self.active = Some(ActiveSession {
            user_id: profile.user_id,
            started_at: now,
            last_activity_at: now,
        });
        self.switch_count += 1;
    }

    /// Activates an already known profile.
    pub fn switch_to_profile(&mut self, user_id: &UserId) -> SyncResult<()> {
        let profile = self
            .profile(user_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownProfile(user_id.to_string()))?;
        self.set_active_profile(profile);
        Ok(())
    }

    /// Signs the active profile out. Known profiles are kept.
    pub fn clear_active_profile(&mut self) {
        self.active = None;
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn active_user_id(&self) -> Option<&UserId> {
        self.active.as_ref().map(|s| &s.user_id)
    }

    pub fn active_profile(&self) -> Option<&UserProfile> {
        self.active_user_id().and_then(|id| self.profile(id))
    }

    /// The active user, or [`SyncError::NoActiveSession`].
    pub fn require_user(&self) -> SyncResult<&UserId> {
        self.active_user_id().ok_or(SyncError::NoActiveSession)
    }

    /// Records user activity in the current session.
    pub fn touch(&mut self) {
        if let Some(session) = self.active.as_mut() {
            session.last_activity_at = Utc::now();
        }
    }

    /// Number of times a profile has been activated on this context.
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }
}
