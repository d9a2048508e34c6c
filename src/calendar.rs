//! 2025 race calendar

use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

const COMPLETED_SUFFIX: &str = " - COMPLETED";

/// Calendar labels: `<Grand Prix> - <Location> (<date>)[ - COMPLETED]`
pub const F1_CALENDAR_2025: [&str; 24] = [
    "Australian Grand Prix - Melbourne (16 Mar) - COMPLETED",
    "Chinese Grand Prix - Shanghai (23 Mar) - COMPLETED",
    "Japanese Grand Prix - Suzuka (6 Apr)",
    "Bahrain Grand Prix - Sakhir (13 Apr)",
    "Saudi Arabian Grand Prix - Jeddah (20 Apr)",
    "Miami Grand Prix - Miami (4 May)",
    "Emilia Romagna Grand Prix - Imola (18 May)",
    "Monaco Grand Prix - Monte Carlo (25 May)",
    "Spanish Grand Prix - Barcelona (1 Jun)",
    "Canadian Grand Prix - Montreal (15 Jun)",
    "Austrian Grand Prix - Spielberg (29 Jun)",
    "British Grand Prix - Silverstone (6 Jul)",
    "Belgian Grand Prix - Spa-Francorchamps (27 Jul)",
    "Hungarian Grand Prix - Budapest (3 Aug)",
    "Dutch Grand Prix - Zandvoort (31 Aug)",
    "Italian Grand Prix - Monza (7 Sep)",
    "Azerbaijan Grand Prix - Baku (21 Sep)",
    "Singapore Grand Prix - Singapore (5 Oct)",
    "United States Grand Prix - Austin (19 Oct)",
    "Mexico City Grand Prix - Mexico City (26 Oct)",
    "São Paulo Grand Prix - São Paulo (9 Nov)",
    "Las Vegas Grand Prix - Las Vegas (22 Nov)",
    "Qatar Grand Prix - Lusail (30 Nov)",
    "Abu Dhabi Grand Prix - Yas Marina (7 Dec)",
];

/// One round of the season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub round: usize,
    pub grand_prix: String,
    pub location: String,
    /// Day and month as printed, e.g. "25 May"
    pub date_label: String,
    pub completed: bool,
}

impl CalendarEntry {
    /// Parse a calendar label
    pub fn parse(round: usize, label: &str) -> Result<Self> {
        let invalid = || PredictorError::Validation(format!("Invalid calendar label {:?}", label));

        let (body, completed) = match label.strip_suffix(COMPLETED_SUFFIX) {
            Some(body) => (body, true),
            None => (label, false),
        };
        let (grand_prix, rest) = body.split_once(" - ").ok_or_else(invalid)?;
        let (location, date) = rest.rsplit_once(" (").ok_or_else(invalid)?;
        let date_label = date.strip_suffix(')').ok_or_else(invalid)?;

        if grand_prix.is_empty() || location.is_empty() || date_label.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            round,
            grand_prix: grand_prix.to_string(),
            location: location.to_string(),
            date_label: date_label.to_string(),
            completed,
        })
    }

    /// Label in the calendar format
    pub fn label(&self) -> String {
        let mut label = format!("{} - {} ({})", self.grand_prix, self.location, self.date_label);
        if self.completed {
            label.push_str(COMPLETED_SUFFIX);
        }
        label
    }

    /// Case-insensitive match on grand prix name or location
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        !query.is_empty()
            && (self.grand_prix.to_lowercase().contains(&query)
                || self.location.to_lowercase() == query)
    }
}

/// The 2025 season, in round order
pub fn calendar_2025() -> Vec<CalendarEntry> {
    F1_CALENDAR_2025
        .iter()
        .enumerate()
        .filter_map(|(i, label)| CalendarEntry::parse(i + 1, label).ok())
        .collect()
}

/// First round matching a grand prix name or location
pub fn find_race(query: &str) -> Option<CalendarEntry> {
    calendar_2025().into_iter().find(|entry| entry.matches(query))
}
