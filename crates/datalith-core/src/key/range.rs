//! Module: key::range
//! Responsibility: half-open upper-bound construction for prefix scans.
//! Does not own: prefix byte layout.
//! Boundary: `[prefix, upper_bound(prefix))` must cover exactly the keys
//! extending the prefix.

/// Smallest byte string strictly greater than every extension of `start`.
///
/// Increments the last non-`0xFF` byte and drops the overflowed tail. When
/// every byte is `0xFF` there is no such bound; appending `0x00` keeps the
/// range well-formed (strictly wider than `start` itself).
#[must_use]
pub(crate) fn prefix_upper_bound(start: &[u8]) -> Vec<u8> {
    let mut end = start.to_vec();

    while let Some(last) = end.last_mut() {
        if *last == 0xFF {
            end.pop();
        } else {
            *last += 1;
            return end;
        }
    }

    let mut end = start.to_vec();
    end.push(0x00);
    end
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::prefix_upper_bound;

    #[test]
    fn increments_the_final_byte() {
        assert_eq!(prefix_upper_bound(&[0x10, 0x05]), vec![0x10, 0x06]);
        assert_eq!(prefix_upper_bound(&[0x10]), vec![0x11]);
    }

    #[test]
    fn carries_over_trailing_overflow() {
        assert_eq!(prefix_upper_bound(&[0x10, 0x02, 0xFF]), vec![0x10, 0x03]);
        assert_eq!(
            prefix_upper_bound(&[0x10, 0xFF, 0xFF]),
            vec![0x11]
        );
    }

    #[test]
    fn all_overflow_appends_a_zero() {
        assert_eq!(
            prefix_upper_bound(&[0xFF, 0xFF]),
            vec![0xFF, 0xFF, 0x00]
        );
    }

    #[test]
    fn bound_sits_strictly_above_every_extension() {
        let prefix = vec![0x10, 0x42];
        let end = prefix_upper_bound(&prefix);

        for extension in [vec![], vec![0x00], vec![0xFF, 0xFF]] {
            let mut key = prefix.clone();
            key.extend_from_slice(&extension);
            assert!(key >= prefix);
            assert!(key < end, "extension {extension:?} escaped the bound");
        }

        let mut outside = prefix.clone();
        if let Some(last) = outside.last_mut() {
            *last += 1;
        }
        assert!(outside >= end);
    }
}
