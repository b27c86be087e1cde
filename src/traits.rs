use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::errors::Result;

/// 二値分類器の抽象化
///
/// 推論エンジンは具象モデルではなくこのトレイトに依存するため、テストではモックを差し込める
pub trait BinaryClassifier: Send + Sync {
    /// 特徴ベクトルから {forged, genuine} の確率を計算
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities>;

    /// 期待する特徴ベクトル長
    fn feature_len(&self) -> usize;
}

/// Two-class probability distribution; the fields sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub forged: f64,
    pub genuine: f64,
}

impl ClassProbabilities {
    pub const fn get(&self, label: Label) -> f64 {
        match label {
            Label::Forged => self.forged,
            Label::Genuine => self.genuine,
        }
    }

    /// Most probable class; an exact tie goes to genuine.
    pub fn argmax(&self) -> Label {
        if self.genuine >= self.forged {
            Label::Genuine
        } else {
            Label::Forged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        let p = ClassProbabilities {
            forged: 0.7,
            genuine: 0.3,
        };
        assert_eq!(p.argmax(), Label::Forged);
        assert_eq!(p.get(Label::Forged), 0.7);

        let tie = ClassProbabilities {
            forged: 0.5,
            genuine: 0.5,
        };
        assert_eq!(tie.argmax(), Label::Genuine);
    }
}
