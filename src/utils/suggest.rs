fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let substitution = previous_diagonal + usize::from(ca != cb);
            previous_diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(previous_diagonal + 1);
        }
    }
    row[b.len()]
}

fn tolerance(input: &str) -> usize {
    match input.len() {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        n => n / 3,
    }
}

/// Rank `candidates` by similarity to `input`, keeping only near misses.
/// A containment hit (either direction) outranks anything except an exact
/// match.
pub fn suggest(input: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = normalize(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let allowed = tolerance(&needle);

    let mut scored: Vec<(usize, &String)> = Vec::new();
    for candidate in candidates {
        let hay = normalize(candidate);
        if hay.is_empty() {
            continue;
        }
        let score = if needle == hay {
            0
        } else if hay.contains(&needle) || needle.contains(&hay) {
            1
        } else {
            edit_distance(&needle, &hay)
        };
        if score <= allowed.max(1) {
            scored.push((score, candidate));
        }
    }

    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });

    let mut out: Vec<String> = Vec::new();
    for (_, candidate) in scored {
        if !out.contains(candidate) {
            out.push(candidate.clone());
        }
        if out.len() >= limit.max(1) {
            break;
        }
    }
    out
}
