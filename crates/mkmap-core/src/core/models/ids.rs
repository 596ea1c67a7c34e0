macro_rules! index_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) usize);

            impl $name {
                #[inline]
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

index_id!(SiteId, SpeciesId, StepId);
