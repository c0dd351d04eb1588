use unicode_normalization::UnicodeNormalization;

/// Stand-in segment when slugification leaves nothing printable.
pub const FALLBACK_SEGMENT: &str = "Neznamy";

/// Folder-safe slug: diacritics stripped via NFD, `&` spelled out as " a ",
/// everything outside ASCII word characters and dashes collapsed into
/// single underscores. Empty results become [`FALLBACK_SEGMENT`].
pub fn slugify_segment(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    for ch in input.nfd() {
        if ('\u{0300}'..='\u{036f}').contains(&ch) {
            continue;
        }
        if ch == '&' {
            cleaned.push_str(" a ");
        } else if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }
    let trimmed = cleaned.trim();
    let mut joined = String::with_capacity(trimmed.len());
    let mut in_gap = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            in_gap = true;
            continue;
        }
        if in_gap {
            joined.push('_');
            in_gap = false;
        }
        joined.push(ch);
    }
    let mut slug = String::with_capacity(joined.len());
    for ch in joined.chars() {
        if ch == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(ch);
    }
    if slug.is_empty() {
        FALLBACK_SEGMENT.to_string()
    } else {
        slug
    }
}

/// Joins a root reference with relative segments, picking the separator
/// from the root's flavor: URL and POSIX roots use `/`, Windows drive and
/// UNC roots use `\`. Segment edges are stripped of stray separators and
/// blank segments are dropped.
pub fn join_root_path(root: &str, segments: &[String]) -> String {
    let trimmed_root = root.trim().trim_end_matches(['/', '\\']);
    let parts: Vec<&str> = segments
        .iter()
        .map(|segment| segment.trim().trim_matches(['/', '\\']))
        .filter(|segment| !segment.is_empty())
        .collect();
    if trimmed_root.is_empty() {
        return parts.join("/");
    }
    let separator = if is_windows_root(trimmed_root) && !is_url_root(trimmed_root) {
        '\\'
    } else {
        '/'
    };
    let mut joined = String::from(trimmed_root);
    for part in parts {
        joined.push(separator);
        joined.push_str(part);
    }
    joined
}

fn is_url_root(root: &str) -> bool {
    let lower = root.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_windows_root(root: &str) -> bool {
    if root.starts_with("\\\\") {
        return true;
    }
    let bytes = root.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(slugify_segment("Zemní práce"), "Zemni_prace");
        assert_eq!(slugify_segment("Žlutý kůň"), "Zluty_kun");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify_segment("ABC s.r.o."), "ABC_s_r_o");
        assert_eq!(slugify_segment("  Elektro --  rozvody  "), "Elektro_--_rozvody");
    }

    #[test]
    fn spells_out_ampersands() {
        assert_eq!(slugify_segment("Beton & Ocel"), "Beton_a_Ocel");
    }

    #[test]
    fn keeps_word_characters_verbatim() {
        assert_eq!(slugify_segment("03_Vyberova_rizeni"), "03_Vyberova_rizeni");
        assert_eq!(slugify_segment("Faza-2"), "Faza-2");
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(slugify_segment(""), FALLBACK_SEGMENT);
        assert_eq!(slugify_segment("???"), FALLBACK_SEGMENT);
        assert_eq!(slugify_segment("   "), FALLBACK_SEGMENT);
    }

    #[test]
    fn joins_posix_roots_with_slashes() {
        assert_eq!(
            join_root_path("/srv/projects/alfa/", &segments(&["01_PD", "Vykresy"])),
            "/srv/projects/alfa/01_PD/Vykresy"
        );
    }

    #[test]
    fn joins_windows_roots_with_backslashes() {
        assert_eq!(
            join_root_path("C:\\Projekty\\Alfa\\", &segments(&["01_PD"])),
            "C:\\Projekty\\Alfa\\01_PD"
        );
        assert_eq!(
            join_root_path("\\\\server\\share", &segments(&["01_PD"])),
            "\\\\server\\share\\01_PD"
        );
    }

    #[test]
    fn joins_url_roots_with_slashes() {
        assert_eq!(
            join_root_path(
                "https://drive.example.com/root/abc/",
                &segments(&["03_Vyberova_rizeni"])
            ),
            "https://drive.example.com/root/abc/03_Vyberova_rizeni"
        );
    }

    #[test]
    fn cleans_segment_edges_and_blanks() {
        assert_eq!(
            join_root_path("/root", &segments(&["/01_PD/", "  ", "Vykresy\\"])),
            "/root/01_PD/Vykresy"
        );
        assert_eq!(join_root_path("", &segments(&["a", "b"])), "a/b");
    }
}
