//! The shell's chat state: a primary surface that always exists, an
//! optional second surface, and the session-id routing between them.

use crate::surface::ChatSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceId {
    Primary,
    Second,
}

/// A surface bound to its backend session.
#[derive(Debug)]
pub struct BoundSurface {
    pub session_id: String,
    pub surface: ChatSurface,
}

impl BoundSurface {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            surface: ChatSurface::new(),
        }
    }
}

/// Fresh opaque session id.
pub fn new_session_id() -> String {
    format!("sess-{}", uuid::Uuid::new_v4())
}

#[derive(Debug)]
pub struct ChatShell {
    primary: BoundSurface,
    second: Option<BoundSurface>,
}

impl Default for ChatShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatShell {
    pub fn new() -> Self {
        Self {
            primary: BoundSurface::new(new_session_id()),
            second: None,
        }
    }

    pub fn primary(&self) -> &BoundSurface {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut BoundSurface {
        &mut self.primary
    }

    pub fn second(&self) -> Option<&BoundSurface> {
        self.second.as_ref()
    }

    pub fn second_mut(&mut self) -> Option<&mut BoundSurface> {
        self.second.as_mut()
    }

    /// True once a second assistant surface exists; later sends skip the
    /// dual-topic check while this holds.
    pub fn second_active(&self) -> bool {
        self.second.is_some()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&BoundSurface> {
        match id {
            SurfaceId::Primary => Some(&self.primary),
            SurfaceId::Second => self.second.as_ref(),
        }
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut BoundSurface> {
        match id {
            SurfaceId::Primary => Some(&mut self.primary),
            SurfaceId::Second => self.second.as_mut(),
        }
    }

    /// Create the second surface with a fresh session and return its
    /// session id. Keeps the existing surface when one is already open.
    pub fn open_second(&mut self) -> String {
        if let Some(ref bound) = self.second {
            return bound.session_id.clone();
        }
        let bound = BoundSurface::new(new_session_id());
        let session_id = bound.session_id.clone();
        self.second = Some(bound);
        session_id
    }

    /// Drop the second surface, returning its session id so the caller
    /// can send the deactivate notification and unsubscribe.
    pub fn close_second(&mut self) -> Option<String> {
        self.second.take().map(|bound| bound.session_id)
    }

    /// Map a stream event's session id to a live surface. None means the
    /// target surface is gone and the event should be dropped.
    pub fn route(&self, session_id: &str) -> Option<SurfaceId> {
        if self.primary.session_id == session_id {
            return Some(SurfaceId::Primary);
        }
        match self.second {
            Some(ref bound) if bound.session_id == session_id => Some(SurfaceId::Second),
            _ => None,
        }
    }
}
