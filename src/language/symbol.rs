use super::Language;

pub type SymbolId = usize;

/// A symbol with `id` as its ID and children of type `E`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Symbol<E> {
    pub id: SymbolId,
    pub children: Vec<E>,
}

impl<E> Symbol<E> {
    pub fn new(id: SymbolId, children: Vec<E>) -> Self {
        Self { id, children }
    }

    pub fn name<'l>(&self, language: &'l Language) -> &'l str {
        language.get_symbol(self.id)
    }
}
