use rand::{SeedableRng, rngs::SmallRng};

pub const SMALL_NUMBER: f64 = 1e-10;

pub fn init_logger() {
    #[allow(unused_must_use)]
    env_logger::try_init();
}

pub fn new_rng() -> SmallRng {
    SmallRng::seed_from_u64(1991)
}
