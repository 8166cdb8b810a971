use ndexec::{NdArray, Order};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn orders() -> impl Strategy<Value = Order> {
    prop_oneof![Just(Order::C), Just(Order::F)]
}

fn shapes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 1..4)
}

fn random_array(dims: &[usize], order: Order, seed: u64) -> NdArray {
    let mut rng = StdRng::seed_from_u64(seed);
    let len: usize = dims.iter().product();
    let data: Vec<f64> = (0..len).map(|_| rng.gen_range(-100.0..100.0)).collect();
    NdArray::from_vec(data, dims, order).unwrap()
}

/// Row-major multi-index of linear index `i`.
fn unravel(mut i: usize, dims: &[usize]) -> Vec<usize> {
    let mut out = vec![0; dims.len()];
    for k in (0..dims.len()).rev() {
        out[k] = i % dims[k];
        i /= dims[k];
    }
    out
}

proptest! {
    #[test]
    fn tile_wraps_source(dims in shapes(), order in orders(), seed in any::<u64>(), rep in 1usize..4) {
        let a = random_array(&dims, order, seed);
        let reps = vec![rep; dims.len()];
        let t = a.tile(&reps).unwrap();
        prop_assert_eq!(t.length(), a.length() * rep.pow(dims.len() as u32));
        let src = a.to_vec::<f64>().unwrap();
        let out = t.to_vec::<f64>().unwrap();
        for (i, &v) in out.iter().enumerate() {
            let ix = unravel(i, t.dims());
            let wrapped: Vec<usize> = ix.iter().zip(&dims).map(|(&c, &d)| c % d).collect();
            let k = wrapped.iter().zip(&dims).fold(0, |acc, (&c, &d)| acc * d + c);
            prop_assert_eq!(v, src[k]);
        }
    }

    #[test]
    fn repeat_expands_axis(dims in shapes(), seed in any::<u64>(), k in 1usize..4, pick in any::<usize>()) {
        let a = random_array(&dims, Order::C, seed);
        let axis = pick % dims.len();
        let r = a.repeat(axis as isize, &[k]).unwrap();
        prop_assert_eq!(r.dims()[axis], k * dims[axis]);
        for (j, (&rd, &ad)) in r.dims().iter().zip(&dims).enumerate() {
            if j != axis {
                prop_assert_eq!(rd, ad);
            }
        }
        let src = a.to_vec::<f64>().unwrap();
        let out = r.to_vec::<f64>().unwrap();
        for (i, &v) in out.iter().enumerate() {
            let mut ix = unravel(i, r.dims());
            ix[axis] /= k;
            let idx = ix.iter().zip(&dims).fold(0, |acc, (&c, &d)| acc * d + c);
            prop_assert_eq!(v, src[idx]);
        }
    }

    #[test]
    fn dup_is_equal(dims in shapes(), order in orders(), target in orders(), seed in any::<u64>()) {
        let a = random_array(&dims, order, seed);
        let copy = a.dup_with_order(target).unwrap();
        prop_assert!(a.equals_to(&copy, 0.0).unwrap());
        prop_assert_eq!(a.to_vec::<f64>().unwrap(), copy.to_vec::<f64>().unwrap());
    }

    #[test]
    fn lambda_round_trip(data in prop::collection::vec(any::<i32>(), 1..64), shift in any::<i32>()) {
        let n = data.len();
        let a = NdArray::from_vec(data.clone(), &[n], Order::C).unwrap();
        a.apply_lambda(move |x: i32| x.wrapping_add(shift), &a).unwrap();
        a.apply_lambda(move |x: i32| x.wrapping_sub(shift), &a).unwrap();
        prop_assert_eq!(a.to_vec::<i32>().unwrap(), data);
    }

    #[test]
    fn row_major_reshape_keeps_sequence(dims in shapes(), seed in any::<u64>()) {
        let a = random_array(&dims, Order::C, seed);
        let flat = a.reshape(&[a.length()], Order::C).unwrap();
        prop_assert!(flat.is_view());
        prop_assert_eq!(flat.to_vec::<f64>().unwrap(), a.to_vec::<f64>().unwrap());
    }
}
