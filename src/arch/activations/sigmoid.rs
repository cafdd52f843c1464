#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn amp(&self) -> f32 {
        self.amp
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    /// Derivative written in terms of the unit sigmoid so it stays finite for large `|z|`.
    pub fn df(&self, z: f32) -> f32 {
        let s = 1. / (1. + (-z).exp());
        self.amp * s * (1. - s)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_is_finite_far_from_zero() {
        let sigmoid = Sigmoid::default();

        assert_eq!(sigmoid.f(0.), 0.5);
        assert_eq!(sigmoid.df(0.), 0.25);
        assert_eq!(sigmoid.df(-200.), 0.);
        assert_eq!(sigmoid.df(200.), 0.);
    }
}
