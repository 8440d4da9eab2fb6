use std::cell::RefCell;

use serde::Serialize;

/// Progress the orchestrator surfaces to the operator while it works.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    AttachingToSession {
        name: String,
    },
    ImageSummary {
        source: String,
        reference: Option<String>,
        platform: Option<String>,
    },
    DescriptorWritten {
        path: String,
        base_image: String,
    },
    DescriptorReused {
        path: String,
        state: String,
        note: Option<String>,
    },
    BuildingImage {
        tag: String,
    },
    ReusingLocalImage {
        reference: String,
    },
    PullingImage {
        reference: String,
    },
    PlatformPinned {
        requested: String,
        run: String,
    },
    CommandPreview {
        command: Vec<String>,
    },
    StartingSession {
        name: String,
    },
}

pub trait Reporter {
    fn notice(&self, notice: &Notice);
}

/// Drops every notice.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn notice(&self, _notice: &Notice) {}
}

/// Keeps notices in memory.
#[derive(Default)]
pub struct RecordingReporter {
    notices: RefCell<Vec<Notice>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn notice(&self, notice: &Notice) {
        self.notices.borrow_mut().push(notice.clone());
    }
}
