use crate::buffer::{AutoGrow, Buffer};
use crate::config::CollectorConfig;
use crate::errors::Result;

/// Downstream consumer of flushed output. Must not keep the reference; the
/// buffer is cleared right after the call returns.
pub type FlushCallback = Box<dyn FnMut(&Buffer) -> Result<()>>;

/// Output buffer that hands its contents to a callback once it gets too big.
pub struct OutputBuffer {
    buffer: Buffer,
    initial_size: usize,
    auto_grow: AutoGrow,
    flush_threshold: usize,
    callback: Option<FlushCallback>,
    flushes: usize,
}

impl OutputBuffer {
    pub fn new(initial_size: usize, flush_threshold: usize, auto_grow: AutoGrow) -> Self {
        Self {
            buffer: Buffer::new(initial_size, auto_grow),
            initial_size,
            auto_grow,
            flush_threshold,
            callback: None,
            flushes: 0,
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(
            config.initial_output_buffer_size,
            config.flush_threshold,
            config.auto_grow,
        )
    }

    /// Installs the consumer called by [`OutputBuffer::flush`].
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Buffer) -> Result<()> + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Number of times the callback has been invoked.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Hands the committed contents to the callback and clears the buffer.
    ///
    /// Does nothing if no callback is installed; use [`OutputBuffer::take`]
    /// to collect the output instead.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(callback) = self.callback.as_mut() {
            callback(&self.buffer)?;
            self.buffer.clear();
            self.flushes += 1;
        }
        Ok(())
    }

    /// Flushes if the committed size exceeds the flush threshold.
    pub fn maybe_flush(&mut self) -> Result<()> {
        if self.buffer.committed() > self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Swaps in a fresh buffer and returns the old one.
    pub fn take(&mut self) -> Buffer {
        std::mem::replace(
            &mut self.buffer,
            Buffer::new(self.initial_size, self.auto_grow),
        )
    }
}
