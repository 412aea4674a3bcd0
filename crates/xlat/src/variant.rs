//! Switch-type variants the translator must speak: ITU, ANSI, and ETSI
//! each carry their own cause/progress/numbering tables.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Itu,
    Ansi,
    Etsi,
}
