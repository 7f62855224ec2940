use crate::chip::ChipInfo;

/// A structure to manage progress reporting of a download.
///
/// This struct stores a handler closure which will be called every time an
/// event happens during the download.
///
/// # Example
///
/// ```
/// use cc2530prog::flashing::FlashProgress;
///
/// // Print events
/// let progress = FlashProgress::new(|event| println!("Event: {:#?}", event));
/// ```
pub struct FlashProgress {
    handler: Box<dyn Fn(ProgressEvent)>,
}

impl Default for FlashProgress {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for FlashProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashProgress").finish_non_exhaustive()
    }
}

impl FlashProgress {
    /// Create a new `FlashProgress` structure with a given `handler` to be
    /// called on events.
    pub fn new(handler: impl Fn(ProgressEvent) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// A progress reporter that ignores every event.
    pub fn empty() -> Self {
        Self::new(|_| {})
    }

    fn emit(&self, event: ProgressEvent) {
        (self.handler)(event);
    }

    pub(super) fn identified(&self, chip: &ChipInfo) {
        self.emit(ProgressEvent::Identified { chip: chip.clone() });
    }

    pub(super) fn started_erasing(&self) {
        self.emit(ProgressEvent::StartedErasing);
    }

    pub(super) fn finished_erasing(&self) {
        self.emit(ProgressEvent::FinishedErasing);
    }

    pub(super) fn failed_erasing(&self) {
        self.emit(ProgressEvent::FailedErasing);
    }

    pub(super) fn started_programming(&self, blocks: u16) {
        self.emit(ProgressEvent::StartedProgramming { blocks });
    }

    pub(super) fn block_programmed(&self, index: u16, size: u16) {
        self.emit(ProgressEvent::BlockProgrammed { index, size });
    }

    pub(super) fn finished_programming(&self, full_speed: bool) {
        self.emit(ProgressEvent::FinishedProgramming { full_speed });
    }

    pub(super) fn failed_programming(&self) {
        self.emit(ProgressEvent::FailedProgramming);
    }

    pub(super) fn started_verifying(&self, bytes: u32) {
        self.emit(ProgressEvent::StartedVerifying { bytes });
    }

    pub(super) fn bytes_verified(&self, bytes: u32) {
        self.emit(ProgressEvent::BytesVerified { bytes });
    }

    pub(super) fn finished_verifying(&self, compared: u32, mismatches: usize) {
        self.emit(ProgressEvent::FinishedVerifying {
            compared,
            mismatches,
        });
    }

    pub(super) fn failed_verifying(&self) {
        self.emit(ProgressEvent::FailedVerifying);
    }
}

/// Possible events during a download.
///
/// If the download works without problems, the events will arrive in the
/// following order:
///
/// * `Identified`
/// * `StartedErasing`
/// * `FinishedErasing`
/// * `StartedProgramming`
/// * `BlockProgrammed` for every block
/// * `FinishedProgramming`
/// * `StartedVerifying`, `BytesVerified` a few times and `FinishedVerifying`,
///   if verification was requested
///
/// If an error occurs in any stage, one of the `Failed*` events will be
/// emitted, and no further events will follow.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The chip was identified.
    Identified { chip: ChipInfo },
    /// Chip erase was started.
    StartedErasing,
    /// The chip is erased.
    FinishedErasing,
    /// Erasing the chip failed.
    FailedErasing,
    /// Programming was started.
    StartedProgramming {
        /// Number of blocks that will be written.
        blocks: u16,
    },
    /// A block was streamed to the target and its flash write started.
    BlockProgrammed { index: u16, size: u16 },
    /// All blocks are in flash.
    FinishedProgramming {
        /// The flash controller kept up with every burst.
        full_speed: bool,
    },
    /// Programming failed.
    FailedProgramming,
    /// Read back of the flash was started.
    StartedVerifying {
        /// Number of bytes that will be compared.
        bytes: u32,
    },
    /// More bytes were compared.
    BytesVerified { bytes: u32 },
    /// Read back finished.
    FinishedVerifying { compared: u32, mismatches: usize },
    /// Reading back the flash failed.
    FailedVerifying,
}
