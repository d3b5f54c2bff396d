use crate::domain::AccessionId;
use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub ids: Vec<AccessionId>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn chunk_ids(ids: &[AccessionId], chunk_size: usize) -> Result<Vec<Chunk>, KiraError> {
    if chunk_size == 0 {
        return Err(KiraError::InvalidChunkSize(chunk_size));
    }
    Ok(ids
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, ids)| Chunk {
            index,
            ids: ids.to_vec(),
        })
        .collect())
}
