use bson::Bson;
use bson::spec::ElementType;
use regex::Regex;

/// A recursive filter expression tree.
///
/// Owns field names and values so the expression can outlive the document
/// it was parsed from. Field names may be dotted paths (`"address.city"`).
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    // Comparison
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    // Set membership
    In(String, Vec<Bson>),
    Nin(String, Vec<Bson>),
    // Compiled at parse time.
    Regex(String, Regex),
    // Existence and type
    Exists(String, bool),
    Type(String, Vec<ElementType>),
}

impl Expression {
    /// An expression that matches every document.
    pub fn always() -> Self {
        Expression::And(Vec::new())
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        use Expression::*;
        match (self, other) {
            (And(a), And(b)) | (Or(a), Or(b)) | (Nor(a), Nor(b)) => a == b,
            (Eq(f1, v1), Eq(f2, v2))
            | (Ne(f1, v1), Ne(f2, v2))
            | (Gt(f1, v1), Gt(f2, v2))
            | (Gte(f1, v1), Gte(f2, v2))
            | (Lt(f1, v1), Lt(f2, v2))
            | (Lte(f1, v1), Lte(f2, v2)) => f1 == f2 && v1 == v2,
            (In(f1, v1), In(f2, v2)) | (Nin(f1, v1), Nin(f2, v2)) => f1 == f2 && v1 == v2,
            (Regex(f1, r1), Regex(f2, r2)) => f1 == f2 && r1.as_str() == r2.as_str(),
            (Exists(f1, b1), Exists(f2, b2)) => f1 == f2 && b1 == b2,
            (Type(f1, t1), Type(f2, t2)) => f1 == f2 && t1 == t2,
            _ => false,
        }
    }
}
