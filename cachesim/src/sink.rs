use crate::error::SinkError;
use crate::metrics::WindowReport;

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Receives one report per finished window.
pub trait WindowSink {
  /// Stores the report of a window of the run named `run`.
  fn write_report(&mut self, run: &str, report: &WindowReport) -> Result<(), SinkError>;

  /// Called once the run has flushed its last window.
  fn finish(&mut self) -> Result<(), SinkError> {
    Ok(())
  }
}

impl<S: WindowSink + ?Sized> WindowSink for &mut S {
  fn write_report(&mut self, run: &str, report: &WindowReport) -> Result<(), SinkError> {
    (**self).write_report(run, report)
  }

  fn finish(&mut self) -> Result<(), SinkError> {
    (**self).finish()
  }
}

/// Writes reports as delimited text rows, preceded by a header row.
#[derive(Debug)]
pub struct DelimitedSink<W: Write> {
  writer: W,
  delimiter: char,
  header_written: bool,
}

impl<W: Write> DelimitedSink<W> {
  /// A comma-separated sink.
  pub fn new(writer: W) -> Self {
    Self::with_delimiter(writer, ',')
  }

  pub fn with_delimiter(writer: W, delimiter: char) -> Self {
    Self {
      writer,
      delimiter,
      header_written: false,
    }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }

  fn write_row<I, T>(&mut self, fields: I) -> Result<(), SinkError>
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    let mut separator = [0u8; 4];
    let separator = self.delimiter.encode_utf8(&mut separator);
    for (i, field) in fields.into_iter().enumerate() {
      if i > 0 {
        self.writer.write_all(separator.as_bytes())?;
      }
      self.writer.write_all(field.as_ref().as_bytes())?;
    }
    self.writer.write_all(b"\n")?;
    Ok(())
  }
}

impl<W: Write> WindowSink for DelimitedSink<W> {
  fn write_report(&mut self, _run: &str, report: &WindowReport) -> Result<(), SinkError> {
    if !self.header_written {
      self.write_row(WindowReport::HEADER)?;
      self.header_written = true;
    }
    self.write_row(report.fields())
  }

  fn finish(&mut self) -> Result<(), SinkError> {
    self.writer.flush()?;
    Ok(())
  }
}

/// Collects the reports of a single run in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
  pub reports: Vec<WindowReport>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }
}

impl WindowSink for MemorySink {
  fn write_report(&mut self, _run: &str, report: &WindowReport) -> Result<(), SinkError> {
    self.reports.push(report.clone());
    Ok(())
  }
}

/// A report tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedReport {
  pub run: String,
  pub report: WindowReport,
}

/// A cloneable sink shared by concurrently running simulations.
#[derive(Debug, Default, Clone)]
pub struct SharedSink {
  rows: Arc<Mutex<Vec<TaggedReport>>>,
}

impl SharedSink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copies out every report collected so far.
  pub fn reports(&self) -> Vec<TaggedReport> {
    self.rows.lock().clone()
  }

  /// Reports of one run, in window order.
  pub fn reports_for(&self, run: &str) -> Vec<WindowReport> {
    let mut reports: Vec<WindowReport> = self
      .rows
      .lock()
      .iter()
      .filter(|row| row.run == run)
      .map(|row| row.report.clone())
      .collect();
    reports.sort_by_key(|report| report.window);
    reports
  }

  pub fn len(&self) -> usize {
    self.rows.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.lock().is_empty()
  }
}

impl WindowSink for SharedSink {
  fn write_report(&mut self, run: &str, report: &WindowReport) -> Result<(), SinkError> {
    self.rows.lock().push(TaggedReport {
      run: run.to_string(),
      report: report.clone(),
    });
    Ok(())
  }
}
