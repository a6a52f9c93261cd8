use crate::dto::roulette::WheelSegment;

/// Member names longer than this are shortened on the coffee wheel.
const MAX_LABEL_CHARS: usize = 8;
const SHORT_LABEL_CHARS: usize = 6;

/// One equal slice per label, colors cycled through `palette`.
pub fn layout<I>(labels: I, palette: &[String]) -> Vec<WheelSegment>
where
    I: IntoIterator<Item = String>,
    I::IntoIter: ExactSizeIterator,
{
    let labels = labels.into_iter();
    let count = labels.len();
    if count == 0 {
        return Vec::new();
    }
    let step = 360.0 / count as f64;

    labels
        .enumerate()
        .map(|(index, label)| WheelSegment {
            label,
            start_angle: step * index as f64,
            end_angle: step * (index + 1) as f64,
            color: palette
                .get(index % palette.len().max(1))
                .cloned()
                .unwrap_or_default(),
        })
        .collect()
}

/// Shorten a long name to its first six characters followed by `..`.
pub fn shorten_label(name: &str) -> String {
    if name.chars().count() > MAX_LABEL_CHARS {
        let prefix: String = name.chars().take(SHORT_LABEL_CHARS).collect();
        format!("{prefix}..")
    } else {
        name.to_owned()
    }
}
