// src/request/naming.rs

//! Destination folder names for callers that did not pick one.
//!
//! Names are random enough to make clashes unlikely, nothing more. Callers
//! that need a guaranteed-fresh directory must pass an explicit destination.

use std::path::{Path, PathBuf};

use rand::Rng;

pub const SUFFIX_LEN: usize = 7;

/// `<cwd>/<prefix>-<method>-<7 lowercase letters>`.
pub fn synthesize_destination<R: Rng>(
    prefix: &str,
    method: &str,
    cwd: &Path,
    rng: &mut R,
) -> PathBuf {
    let suffix = random_suffix(rng);
    cwd.join(folder_name(prefix, method, &suffix))
}

/// Join the parts, then make the result a single path component.
pub fn folder_name(prefix: &str, method: &str, suffix: &str) -> String {
    format!("{prefix}-{method}-{suffix}")
        .replace('/', "-")
        .trim_matches('-')
        .to_string()
}

pub fn random_suffix<R: Rng>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn synthesized_path_is_rooted_at_cwd() {
        let mut rng = StdRng::seed_from_u64(7);
        let cwd = Path::new("/work/area");
        let dest = synthesize_destination("Aculi-mergekit", "dare_ties", cwd, &mut rng);

        assert_eq!(dest.parent(), Some(cwd));
        let name = dest.file_name().unwrap().to_str().unwrap();
        let suffix = name.strip_prefix("Aculi-mergekit-dare_ties-").unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn slashes_and_outer_dashes_are_removed() {
        assert_eq!(folder_name("/team/merges", "ties", "abcdefg"), "team-merges-ties-abcdefg");
        assert_eq!(folder_name("-x-", "linear", "qqqqqqq"), "x--linear-qqqqqqq");
    }

    proptest! {
        #[test]
        fn folder_name_is_one_component(prefix in "[a-zA-Z][a-zA-Z/_-]{0,11}", seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let suffix = random_suffix(&mut rng);
            let name = folder_name(&prefix, "slerp", &suffix);

            prop_assert!(!name.contains('/'));
            prop_assert!(!name.starts_with('-'));
            let expected_tail = format!("-slerp-{suffix}");
            prop_assert!(name.ends_with(&expected_tail));
        }

        #[test]
        fn suffix_is_seven_lowercase_letters(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let suffix = random_suffix(&mut rng);
            prop_assert_eq!(suffix.len(), SUFFIX_LEN);
            prop_assert!(suffix.bytes().all(|b| b.is_ascii_lowercase()));
        }
    }
}
