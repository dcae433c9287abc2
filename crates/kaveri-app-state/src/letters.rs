use kaveri_client_core::models::LetterRecord;

use crate::AppContext;
use crate::mutation::{
    MutationController, MutationField, MutationKey, MutationLabels, MutationOutcome,
};
use crate::notify::{Notifications, ToastLifetime};

pub const LETTER_UPDATE_FAILED: &str = "Failed to update letter status.";

/// Local copy of one agent's generated letters, with immediate
/// authorization toggles.
#[derive(Debug, Default)]
pub struct LettersPanel {
    letters: Vec<LetterRecord>,
    mutations: MutationController,
}

impl LettersPanel {
    #[must_use]
    pub fn new(letters: Vec<LetterRecord>) -> Self {
        Self {
            letters,
            mutations: MutationController::default(),
        }
    }

    pub fn replace(&mut self, letters: Vec<LetterRecord>) {
        self.letters = letters;
    }

    #[must_use]
    pub fn letters(&self) -> &[LetterRecord] {
        &self.letters
    }

    #[must_use]
    pub fn letter(&self, letter_id: &str) -> Option<&LetterRecord> {
        self.letters.iter().find(|letter| letter.id == letter_id)
    }

    #[must_use]
    pub fn is_updating(&self, letter_id: &str) -> bool {
        self.mutations
            .is_pending(&MutationKey::new(letter_id, MutationField::Authorization))
    }

    /// Flips `authorized` on one letter. `None` when the letter is unknown or
    /// already being updated.
    pub async fn toggle(
        &mut self,
        ctx: &AppContext,
        letter_id: &str,
        notifications: &mut Notifications,
    ) -> Option<MutationOutcome<bool>> {
        let index = self.letters.iter().position(|letter| letter.id == letter_id)?;
        let current = self.letters[index].authorized;
        let target = !current;
        let labels = MutationLabels {
            success: Some(format!(
                "Letter marked as {}.",
                if target { "authorized" } else { "unauthorized" }
            )),
            failure: LETTER_UPDATE_FAILED.to_string(),
            lifetime: ToastLifetime::Standard,
        };

        let key = MutationKey::new(letter_id, MutationField::Authorization);
        let pending = self.mutations.begin(key, current, target, labels)?;
        self.mutations
            .stage(&pending, &mut self.letters[index].authorized);

        let result = ctx.api().authorize_letter(letter_id, target).await;
        let outcome = self
            .mutations
            .settle(pending, result, notifications, ctx.now());
        if let Some(letter) = self.letters.iter_mut().find(|letter| letter.id == letter_id) {
            letter.authorized = *outcome.value();
        }
        Some(outcome)
    }
}
