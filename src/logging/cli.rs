//! Command-line logger
use super::{Event, LogError, Loggable, Logger};
use enum_map::{enum_map, EnumMap};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Logger that writes periodic summaries to stdout.
pub struct CLILogger {
    events: EnumMap<Event, EventLog>,

    display_period: Duration,
    last_display_time: Instant,

    average_between_displays: bool,
}

impl CLILogger {
    pub fn new(display_period: Duration, average_between_displays: bool) -> Self {
        Self {
            events: enum_map! { _ => EventLog::new() },
            display_period,
            last_display_time: Instant::now(),
            average_between_displays,
        }
    }

    /// Display the summary and clear all stored data.
    pub fn display(&mut self) {
        print!("{}", self.summary());
        self.last_display_time = Instant::now();
    }

    /// Format the summary since the last display and clear the aggregated values.
    fn summary(&mut self) -> String {
        let mut out = String::from("\n");
        for (event, event_log) in self.events.iter_mut() {
            let summary_size = event_log.index - event_log.summary_start_index;
            if summary_size == 0 {
                continue;
            }

            out.push_str("==== ");
            if self.average_between_displays {
                out.push_str(&format!(
                    "{:?}s {} - {}",
                    event,
                    event_log.summary_start_index,
                    event_log.index - 1
                ));
            } else {
                out.push_str(&format!("{:?} {}", event, event_log.index - 1));
            }
            // Saturate rather than fail on absurdly long summaries
            let divisor = u32::try_from(summary_size).unwrap_or(u32::MAX);
            out.push_str(&format!(
                " ({:?} / event) ====\n",
                event_log.summary_duration / divisor
            ));

            for (name, aggregator) in &mut event_log.aggregators {
                if aggregator.has_data() {
                    out.push_str(&format!("{}: {}\n", name, aggregator));
                }
                aggregator.clear()
            }
            event_log.summary_start_index = event_log.index;
        }
        out
    }
}

impl Logger for CLILogger {
    fn log(&mut self, event: Event, name: &'static str, value: Loggable) -> Result<(), LogError> {
        let aggregators = &mut self.events[event].aggregators;
        if let Some(aggregator) = aggregators.get_mut(name) {
            if let Err((value, expected)) = aggregator.update(value) {
                return Err(LogError::new(name, value, expected));
            }
        } else {
            if let Loggable::IndexSample { value: index, size } = value {
                if index >= size {
                    return Err(LogError::new(name, value, format!("index < {}", size)));
                }
            }
            aggregators.insert(name, Aggregator::new(value));
        }
        Ok(())
    }

    fn done(&mut self, event: Event) {
        let event_info = &mut self.events[event];
        event_info.index += 1;

        for aggregator in event_info.aggregators.values_mut() {
            aggregator.commit()
        }

        let time_since_display = self.last_display_time.elapsed();
        event_info.summary_duration = time_since_display;
        if time_since_display < self.display_period {
            return;
        }

        self.display();
    }
}

impl Drop for CLILogger {
    fn drop(&mut self) {
        // Ensure everything is flushed.
        self.display();
    }
}

struct EventLog {
    /// Global index for this event
    index: u64,
    /// Value of `index` at the start of this summary period
    summary_start_index: u64,
    /// Duration of this summary period to the most recent update
    summary_duration: Duration,
    /// An aggregator for each log entry.
    aggregators: BTreeMap<&'static str, Aggregator>,
}

impl EventLog {
    #[allow(clippy::missing_const_for_fn)] // BTreeMap const new not stabilized
    fn new() -> Self {
        Self {
            index: 0,
            summary_start_index: 0,
            summary_duration: Duration::new(0, 0),
            aggregators: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
enum Aggregator {
    /// Aggregates nothing
    Nothing,
    ScalarMean {
        accumulator: MeanAccumulator,
        pending: Option<f64>,
    },
    IndexDistribution {
        accumulator: IndexDistributionAccumulator,
        pending: Option<usize>,
    },
}
use Aggregator::*;

impl Aggregator {
    /// Create a new aggregator from a logged value.
    fn new(value: Loggable) -> Self {
        match value {
            Loggable::Nothing => Nothing,
            Loggable::Scalar(x) => ScalarMean {
                accumulator: MeanAccumulator::new(),
                pending: Some(x),
            },
            Loggable::IndexSample { value, size } => IndexDistribution {
                accumulator: IndexDistributionAccumulator::new(size),
                pending: Some(value),
            },
        }
    }

    /// Update an aggregator with a logged value within an event.
    ///
    /// Returns Err((value, expected)) if the value is incompatible with this aggregator.
    fn update(&mut self, value: Loggable) -> Result<(), (Loggable, String)> {
        match (self, value) {
            (Nothing, Loggable::Nothing) => {}
            (ScalarMean { pending, .. }, Loggable::Scalar(x)) => *pending = Some(x),
            (
                IndexDistribution {
                    accumulator,
                    pending,
                },
                Loggable::IndexSample { value, size },
            ) if accumulator.counts.len() == size && value < size => *pending = Some(value),
            (Nothing, value) => return Err((value, "Nothing".into())),
            (ScalarMean { .. }, value) => return Err((value, "Scalar".into())),
            (IndexDistribution { accumulator, .. }, value) => {
                return Err((
                    value,
                    format!("IndexSample{{size: {}}}", accumulator.counts.len()),
                ))
            }
        };
        Ok(())
    }

    /// Commit the pending values into the aggregate.
    fn commit(&mut self) {
        match self {
            Nothing => {}
            ScalarMean {
                accumulator,
                pending,
            } => {
                if let Some(value) = pending.take() {
                    accumulator.insert(value)
                }
            }
            IndexDistribution {
                accumulator,
                pending,
            } => {
                if let Some(value) = pending.take() {
                    accumulator.insert(value)
                }
            }
        }
    }

    /// Whether any value has been committed since the last clear.
    fn has_data(&self) -> bool {
        match self {
            Nothing => true,
            ScalarMean { accumulator, .. } => accumulator.count > 0,
            IndexDistribution { accumulator, .. } => accumulator.counts.iter().any(|&c| c > 0),
        }
    }

    /// Clear the aggregated values (but not the pending values)
    fn clear(&mut self) {
        match self {
            Nothing => {}
            ScalarMean { accumulator, .. } => accumulator.clear(),
            IndexDistribution { accumulator, .. } => accumulator.clear(),
        }
    }
}

/// Display the commited aggregated value.
impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Nothing => write!(f, "Nothing"),
            ScalarMean { accumulator, .. } => accumulator.fmt(f),
            IndexDistribution { accumulator, .. } => accumulator.fmt(f),
        }
    }
}

#[derive(Debug)]
struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl MeanAccumulator {
    const fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn insert(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn clear(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

impl fmt::Display for MeanAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sum / (self.count as f64))
    }
}

#[derive(Debug)]
struct IndexDistributionAccumulator {
    counts: Vec<u64>,
}

impl IndexDistributionAccumulator {
    fn new(size: usize) -> Self {
        Self {
            counts: vec![0; size],
        }
    }

    fn insert(&mut self, value: usize) {
        self.counts[value] += 1;
    }

    fn clear(&mut self) {
        for count in &mut self.counts {
            *count = 0;
        }
    }
}

impl fmt::Display for IndexDistributionAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return write!(f, "None");
        }
        write!(f, "[")?;
        for (i, c) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.3}", (*c as f64) / (total as f64))?;
        }
        write!(f, "]")
    }
}
