use serde::Serialize;

/// Row counts per label, in the order labels first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Histogram {
    /// `(label, count)` pairs.
    pub entries: Vec<(String, usize)>,
}

impl Histogram {
    /// Labels in first-seen order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Counts aligned with [`Histogram::labels`].
    pub fn counts(&self) -> Vec<usize> {
        self.entries.iter().map(|(_, count)| *count).collect()
    }

    /// True when no row contributed a label.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Count rows by their first cell.
///
/// Rows without cells are skipped. An empty input gives an empty histogram.
pub fn summarize<R: AsRef<[String]>>(rows: &[R]) -> Histogram {
    let mut entries: Vec<(String, usize)> = Vec::new();
    for row in rows {
        let Some(label) = row.as_ref().first() else {
            continue;
        };
        match entries.iter_mut().find(|(seen, _)| seen == label) {
            Some((_, count)) => *count += 1,
            None => entries.push((label.clone(), 1)),
        }
    }
    Histogram { entries }
}
