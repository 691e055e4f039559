use crate::sample::ValidatedSample;

pub const TIME_LABEL: &str = "TIME";
pub const PULSE_LABEL: &str = "PULSE";
pub const SPO2_LABEL: &str = "SPO2";
pub const PLETH_LABEL: &str = "PLETH";

// Plenty for a few minutes at the device's notification rate before the
// first reallocation.
const INITIAL_CAPACITY: usize = 1024;

/// Append-only, timestamp-indexed storage for the three measured channels.
///
/// All channels share one timestamp sequence: index `i` of every channel
/// belongs to the i-th validated sample, so the channel lengths are always
/// equal. Timestamps arrive in non-decreasing order because the acquisition
/// loop is the only writer; that ordering is not re-checked here.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    timestamps: Vec<f64>,
    pulse: Vec<u8>,
    spo2: Vec<u8>,
    pleth: Vec<u8>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self {
            timestamps: Vec::with_capacity(INITIAL_CAPACITY),
            pulse: Vec::with_capacity(INITIAL_CAPACITY),
            spo2: Vec::with_capacity(INITIAL_CAPACITY),
            pleth: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn append(&mut self, sample: &ValidatedSample) {
        self.timestamps.push(sample.timestamp);
        self.pulse.push(sample.pulse_rate);
        self.spo2.push(sample.spo2);
        self.pleth.push(sample.plethysmogram);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn pulse(&self) -> &[u8] {
        &self.pulse
    }

    pub fn spo2(&self) -> &[u8] {
        &self.spo2
    }

    pub fn pleth(&self) -> &[u8] {
        &self.pleth
    }

    /// Row-aligned view keyed by timestamp.
    ///
    /// A channel that was never appended contributes no column at all; a
    /// reader must not mistake "no reading yet" for a zero reading.
    pub fn to_table(&self) -> SeriesTable {
        let mut columns = Vec::new();
        if !self.pulse.is_empty() {
            columns.push((PULSE_LABEL, self.pulse.clone()));
        }
        if !self.spo2.is_empty() {
            columns.push((SPO2_LABEL, self.spo2.clone()));
        }
        if !self.pleth.is_empty() {
            columns.push((PLETH_LABEL, self.pleth.clone()));
        }
        SeriesTable {
            timestamps: self.timestamps.clone(),
            columns,
        }
    }
}

/// A rendered, immutable table: one timestamp index plus the channel
/// columns in fixed pulse/spo2/pleth order.
#[derive(Debug, Clone)]
pub struct SeriesTable {
    timestamps: Vec<f64>,
    columns: Vec<(&'static str, Vec<u8>)>,
}

impl SeriesTable {
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Header cells, index label first.
    pub fn header(&self) -> Vec<&str> {
        let mut header = vec![TIME_LABEL];
        header.extend(self.columns.iter().map(|(label, _)| *label));
        header
    }

    /// Rows in index order, every cell rendered as text. Timestamps keep
    /// their two-decimal resolution.
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.timestamps.iter().enumerate().map(move |(i, t)| {
            let mut row = vec![format!("{t:.2}")];
            row.extend(self.columns.iter().map(|(_, values)| values[i].to_string()));
            row
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, pulse: u8) -> ValidatedSample {
        ValidatedSample {
            timestamp: t,
            pulse_rate: pulse,
            spo2: 98,
            plethysmogram: 33,
        }
    }

    #[test]
    fn channels_grow_together() {
        let mut series = SeriesSet::new();
        assert!(series.is_empty());
        series.append(&sample(0.0, 70));
        series.append(&sample(0.1, 71));
        assert_eq!(series.len(), 2);
        assert_eq!(series.pulse().len(), series.spo2().len());
        assert_eq!(series.spo2().len(), series.pleth().len());
        assert_eq!(series.timestamps(), &[0.0, 0.1]);
    }

    #[test]
    fn empty_set_renders_no_columns() {
        let table = SeriesSet::new().to_table();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.header(), vec![TIME_LABEL]);
        assert_eq!(table.rows().count(), 0);
    }

    #[test]
    fn table_rows_align_with_timestamps() {
        let mut series = SeriesSet::new();
        series.append(&sample(0.0, 70));
        series.append(&sample(1.5, 80));
        let table = series.to_table();

        assert_eq!(table.header(), vec!["TIME", "PULSE", "SPO2", "PLETH"]);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0], vec!["0.00", "70", "98", "33"]);
        assert_eq!(rows[1], vec!["1.50", "80", "98", "33"]);
    }
}
