//! LRC format parser
//!
//! Turns cached lyrics text into display lines:
//! [mm:ss.xx] Lyrics line here
//!
//! Lines may carry several timestamps, `[offset:+/-ms]` shifts every
//! timestamp, and other `[key:value]` metadata tags are dropped. Text with no
//! timestamps at all is kept as untimed lines in their original order.

/// One display line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrcLine {
    /// Start time in milliseconds, `None` for plain-text lyrics.
    pub time_ms: Option<u64>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrcDocument {
    pub lines: Vec<LrcLine>,
}

enum Tag<'a> {
    Time(u64),
    Meta(&'a str, &'a str),
}

impl LrcDocument {
    pub fn parse(content: &str) -> Self {
        let mut offset_ms: i64 = 0;
        let mut timed: Vec<(u64, String)> = Vec::new();
        let mut plain: Vec<String> = Vec::new();

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((tags, text)) = leading_tags(line) else {
                plain.push(line.to_string());
                continue;
            };

            let mut stamps = Vec::new();
            for tag in tags {
                match tag {
                    Tag::Time(ms) => stamps.push(ms),
                    Tag::Meta("offset", value) => {
                        offset_ms = value.trim().parse().unwrap_or(offset_ms);
                    }
                    Tag::Meta(..) => {}
                }
            }
            for ms in stamps {
                timed.push((ms, text.to_string()));
            }
        }

        if timed.is_empty() {
            let lines = plain
                .into_iter()
                .map(|text| LrcLine { time_ms: None, text })
                .collect();
            return Self { lines };
        }

        // A positive offset makes lyrics appear earlier.
        let mut lines: Vec<LrcLine> = timed
            .into_iter()
            .map(|(ms, text)| LrcLine {
                time_ms: Some(
                    i64::try_from(ms)
                        .unwrap_or(i64::MAX)
                        .saturating_sub(offset_ms)
                        .max(0) as u64,
                ),
                text,
            })
            .collect();
        lines.sort_by_key(|l| l.time_ms);
        Self { lines }
    }

    pub fn is_synced(&self) -> bool {
        self.lines.first().is_some_and(|l| l.time_ms.is_some())
    }

    /// Index of the line being sung at `position_ms`, if any has started yet.
    pub fn line_at(&self, position_ms: u64) -> Option<usize> {
        if !self.is_synced() {
            return None;
        }
        let started = self
            .lines
            .partition_point(|l| l.time_ms.unwrap_or(0) <= position_ms);
        started.checked_sub(1)
    }
}

/// Split `[..][..]text` into its recognised tags and the remaining text.
/// Returns `None` when the line doesn't start with a timestamp or metadata tag,
/// so lines like `[Chorus]` stay plain text.
fn leading_tags(line: &str) -> Option<(Vec<Tag<'_>>, &str)> {
    let mut tags = Vec::new();
    let mut rest = line;

    while let Some(inner) = rest.strip_prefix('[') {
        let end = inner.find(']')?;
        tags.push(classify(&inner[..end])?);
        rest = &inner[end + 1..];
    }

    if tags.is_empty() {
        None
    } else {
        Some((tags, rest.trim()))
    }
}

fn classify(tag: &str) -> Option<Tag<'_>> {
    if let Some(ms) = parse_timestamp(tag) {
        return Some(Tag::Time(ms));
    }
    let (key, value) = tag.split_once(':')?;
    if !key.is_empty() && key.len() <= 8 && key.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(Tag::Meta(key, value))
    } else {
        None
    }
}

/// `mm:ss`, `mm:ss.f`, `mm:ss.ff`, `mm:ss.fff` or `mm:ss:ff` to milliseconds.
fn parse_timestamp(s: &str) -> Option<u64> {
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());

    let (min, rest) = s.split_once(':')?;
    let (sec, frac) = match rest.split_once(['.', ':']) {
        Some((sec, frac)) => (sec, Some(frac)),
        None => (rest, None),
    };
    if !digits(min) || !digits(sec) {
        return None;
    }
    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;
    if sec >= 60 {
        return None;
    }

    let frac_ms = match frac {
        None => 0,
        Some(f) if digits(f) && f.len() <= 3 => {
            f.parse::<u64>().ok()? * 10u64.pow(3 - f.len() as u32)
        }
        Some(_) => return None,
    };

    min.checked_mul(60_000)?
        .checked_add(sec * 1000)?
        .checked_add(frac_ms)
}
